//! Interval scheduling of periodic automations.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use keyshift_automation::{Automation, AutomationRegistry};
use keyshift_core::{AutomationId, OrgContext};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::orchestrator::{RotationOrchestrator, TriggerEvent};

/// Fires `timing` triggers for active automations with an interval
/// schedule.
///
/// An automation is due once its period has elapsed since it last fired,
/// or since it was last updated if it has not fired yet. Crontab schedules
/// are left to an external scheduler.
pub struct IntervalScheduler {
    orchestrator: Arc<RotationOrchestrator>,
    registry: Arc<AutomationRegistry>,
    config: SchedulerConfig,
    last_fired: DashMap<AutomationId, DateTime<Utc>>,
    crontab_warned: DashSet<AutomationId>,
}

impl IntervalScheduler {
    pub fn new(
        orchestrator: Arc<RotationOrchestrator>,
        registry: Arc<AutomationRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            config,
            last_fired: DashMap::new(),
            crontab_warned: DashSet::new(),
        }
    }

    /// Automations whose period has elapsed at `now`.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Automation> {
        let periodic = self.registry.periodic();
        self.forget_missing(&periodic);
        periodic
            .into_iter()
            .filter(|automation| {
                let Some(period) = automation.schedule.period() else {
                    if automation.schedule.crontab.is_some() && self.crontab_warned.insert(automation.id) {
                        tracing::warn!(
                            automation = %automation.id,
                            name = %automation.name,
                            "crontab schedules are not run by the interval scheduler"
                        );
                    }
                    return false;
                };
                let since = self
                    .last_fired
                    .get(&automation.id)
                    .map_or(automation.audit.date_updated, |t| *t.value());
                now - since >= period
            })
            .collect()
    }

    /// Automations the scheduler holds firing or warning state for.
    pub fn tracked(&self) -> usize {
        let mut ids: HashSet<AutomationId> = self.last_fired.iter().map(|e| *e.key()).collect();
        ids.extend(self.crontab_warned.iter().map(|id| *id));
        ids.len()
    }

    /// Drops state for automations that were removed, deactivated or lost
    /// their schedule.
    fn forget_missing(&self, periodic: &[Automation]) {
        let live: HashSet<AutomationId> = periodic.iter().map(|a| a.id).collect();
        self.last_fired.retain(|id, _| live.contains(id));
        self.crontab_warned.retain(|id| live.contains(id));
    }

    /// Fires every due automation that is not already running. Each
    /// execution runs on its own task. Returns the fired automations.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<AutomationId> {
        let mut fired = Vec::new();
        for automation in self.due(now) {
            if self.orchestrator.is_running(automation.id) {
                tracing::debug!(automation = %automation.id, "previous execution still running, skipping");
                continue;
            }
            self.last_fired.insert(automation.id, now);
            fired.push(automation.id);

            let orchestrator = Arc::clone(&self.orchestrator);
            let ctx = OrgContext::system(automation.org_id);
            let event = TriggerEvent::timing(automation.id);
            tokio::spawn(async move {
                if let Err(err) = orchestrator.on_trigger(&ctx, event).await {
                    if err.is_empty_scope() {
                        tracing::info!(automation = %event.automation_id, "nothing in scope");
                    } else {
                        tracing::warn!(automation = %event.automation_id, error = %err, "scheduled execution failed");
                    }
                }
            });
        }
        fired
    }

    /// Ticks every `config.tick` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(tick = ?self.config.tick, "interval scheduler started");
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let fired = self.tick(Utc::now());
                    if !fired.is_empty() {
                        tracing::info!(count = fired.len(), "fired periodic automations");
                    }
                }
                () = shutdown.cancelled() => {
                    tracing::info!("interval scheduler stopped");
                    return;
                }
            }
        }
    }
}
