//! Trigger to finalized execution.

use std::sync::Arc;

use dashmap::DashMap;
use keyshift_automation::{Automation, AutomationRegistry, Inventory, Target, TargetResolver};
use keyshift_core::{AutomationId, ExecutionId, OrgContext, RecordId};
use keyshift_execution::{ExecutionLedger, Finalized, LedgerError, RecordUpdate, TriggerKind};
use keyshift_secret::{RandomGenerator, SecretGenerator};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::backend::{ExecutionBackend, MergePolicy};
use crate::config::OrchestratorConfig;
use crate::events::{EventBus, RotationEvent};
use crate::notify::{ExecutionOutcome, NotificationSink};
use crate::retry::CaptureRetry;
use crate::worker::RecordTask;
use crate::{EngineError, EngineResult};

/// Request to run an automation once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub automation_id: AutomationId,
    pub trigger: TriggerKind,
}

impl TriggerEvent {
    pub fn manual(automation_id: AutomationId) -> Self {
        Self {
            automation_id,
            trigger: TriggerKind::Manual,
        }
    }

    pub fn timing(automation_id: AutomationId) -> Self {
        Self {
            automation_id,
            trigger: TriggerKind::Timing,
        }
    }
}

/// Error left on records still open when their trigger is dropped.
const ABANDONED: &str = "aborted: trigger dropped before the record settled";

struct RunningExecution {
    automation_id: AutomationId,
    cancel: CancellationToken,
}

/// Holds an execution's `running` entry for the lifetime of its dispatch.
///
/// Dropped without [`RunningGuard::disarm`], it cancels the execution, fails
/// every open record with [`ABANDONED`] and finalizes.
struct RunningGuard<'a> {
    orchestrator: &'a RotationOrchestrator,
    ctx: &'a OrgContext,
    execution_id: ExecutionId,
    cancel: CancellationToken,
    armed: bool,
}

impl<'a> RunningGuard<'a> {
    fn register(
        orchestrator: &'a RotationOrchestrator,
        ctx: &'a OrgContext,
        execution_id: ExecutionId,
        automation_id: AutomationId,
    ) -> Self {
        let cancel = CancellationToken::new();
        orchestrator.running.insert(
            execution_id,
            RunningExecution {
                automation_id,
                cancel: cancel.clone(),
            },
        );
        Self {
            orchestrator,
            ctx,
            execution_id,
            cancel,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.running.remove(&self.execution_id);
        if self.armed {
            self.cancel.cancel();
            tracing::warn!(execution = %self.execution_id, "trigger dropped mid-dispatch");
            self.orchestrator.abandon(self.ctx, self.execution_id);
        }
    }
}

/// Runs change-secret automations against an [`ExecutionBackend`].
///
/// Every trigger produces its own execution. Concurrent triggers of the
/// same automation do not share state beyond the ledger.
pub struct RotationOrchestrator {
    registry: Arc<AutomationRegistry>,
    inventory: Arc<dyn Inventory>,
    generator: Arc<dyn SecretGenerator>,
    ledger: Arc<dyn ExecutionLedger>,
    backend: Arc<dyn ExecutionBackend>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    events: Arc<EventBus>,
    config: OrchestratorConfig,
    running: DashMap<ExecutionId, RunningExecution>,
}

pub struct OrchestratorBuilder {
    registry: Arc<AutomationRegistry>,
    inventory: Arc<dyn Inventory>,
    ledger: Arc<dyn ExecutionLedger>,
    backend: Arc<dyn ExecutionBackend>,
    generator: Option<Arc<dyn SecretGenerator>>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    events: Option<Arc<EventBus>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn SecretGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> EngineResult<RotationOrchestrator> {
        self.config.validate()?;
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(EventBus::new(self.config.event_capacity)));
        Ok(RotationOrchestrator {
            registry: self.registry,
            inventory: self.inventory,
            generator: self.generator.unwrap_or_else(|| Arc::new(RandomGenerator)),
            ledger: self.ledger,
            backend: self.backend,
            sinks: self.sinks,
            events,
            config: self.config,
            running: DashMap::new(),
        })
    }
}

impl RotationOrchestrator {
    pub fn builder(
        registry: Arc<AutomationRegistry>,
        inventory: Arc<dyn Inventory>,
        ledger: Arc<dyn ExecutionLedger>,
        backend: Arc<dyn ExecutionBackend>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            registry,
            inventory,
            ledger,
            backend,
            generator: None,
            sinks: Vec::new(),
            events: None,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn ledger(&self) -> &Arc<dyn ExecutionLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one execution of the triggered automation to completion.
    ///
    /// Returns once every record is terminal and the execution is
    /// finalized. An empty scope is an error and creates nothing in the
    /// ledger. Dropping the returned future mid-dispatch fails the open
    /// records and finalizes the execution.
    #[tracing::instrument(
        skip(self, ctx),
        fields(org = %ctx.org_id(), automation = %event.automation_id, trigger = %event.trigger)
    )]
    pub async fn on_trigger(&self, ctx: &OrgContext, event: TriggerEvent) -> EngineResult<ExecutionId> {
        let automation = self.registry.get(ctx, event.automation_id)?;
        if !automation.is_active {
            return Err(EngineError::AutomationInactive(automation.id));
        }
        let policy = match automation.as_change_secret() {
            Some(config) => MergePolicy::for_config(config),
            None => {
                return Err(EngineError::UnsupportedKind {
                    automation_id: automation.id,
                    kind: automation.automation_type(),
                });
            }
        };

        let targets = {
            let resolver = TargetResolver::new(self.inventory.as_ref(), self.generator.as_ref());
            resolver.resolve(&automation)?
        };

        let execution = self.ledger.create_execution(ctx, &automation, event.trigger)?;
        let mut planned = Vec::with_capacity(targets.len());
        for target in targets {
            let record = self.ledger.create_record(ctx, execution.id, &target.account)?;
            planned.push((record.id, target));
        }

        let guard = RunningGuard::register(self, ctx, execution.id, automation.id);
        tracing::info!(execution = %execution.id, records = planned.len(), "execution started");
        self.events.emit(RotationEvent::ExecutionStarted {
            execution_id: execution.id,
            automation_id: automation.id,
            records: planned.len(),
        });

        let cancel = guard.cancel.clone();
        let dispatched = self.dispatch(ctx, execution.id, planned, policy, cancel).await;
        guard.disarm();
        dispatched?;

        self.settle(ctx, execution.id)?;
        Ok(execution.id)
    }

    /// Fails the open records of an execution whose dispatch will never
    /// complete, then finalizes it.
    fn abandon(&self, ctx: &OrgContext, execution_id: ExecutionId) {
        let records = match self.ledger.records(ctx, execution_id) {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(execution = %execution_id, error = %err, "cannot read abandoned execution");
                return;
            }
        };
        for record in records.iter().filter(|r| !r.status.is_terminal()) {
            // A task that has not observed its abort yet may settle first.
            match self.ledger.update_record(ctx, record.id, RecordUpdate::failed(ABANDONED)) {
                Ok(_) | Err(LedgerError::RecordTerminal { .. }) => {}
                Err(err) => {
                    tracing::error!(record = %record.id, error = %err, "cannot fail abandoned record");
                }
            }
        }
        if let Err(err) = self.settle(ctx, execution_id) {
            tracing::error!(execution = %execution_id, error = %err, "cannot finalize abandoned execution");
        }
    }

    /// Fans records out over at most `max_concurrency` tasks and waits for
    /// all of them.
    async fn dispatch(
        &self,
        ctx: &OrgContext,
        execution_id: ExecutionId,
        planned: Vec<(RecordId, Target)>,
        policy: MergePolicy,
        cancel: CancellationToken,
    ) -> EngineResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let retry = CaptureRetry::from_config(&self.config);
        let mut join_set = JoinSet::new();

        for (record_id, target) in planned {
            let task = RecordTask {
                ctx: ctx.clone(),
                execution_id,
                record_id,
                target,
                policy,
                ledger: Arc::clone(&self.ledger),
                backend: Arc::clone(&self.backend),
                events: Arc::clone(&self.events),
                semaphore: Arc::clone(&semaphore),
                cancel: cancel.clone(),
                retry,
                timeout: self.config.record_timeout,
            };
            join_set.spawn(task.run());
        }

        let mut ledger_error: Option<LedgerError> = None;
        let mut panicked: Option<String> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    tracing::trace!(record = %outcome.record_id, status = %outcome.status, "record settled");
                }
                Ok(Err(err)) => {
                    tracing::error!(execution = %execution_id, error = %err, "ledger rejected a record write");
                    cancel.cancel();
                    ledger_error.get_or_insert(err);
                }
                Err(join_err) => {
                    tracing::error!(execution = %execution_id, error = %join_err, "record task panicked");
                    cancel.cancel();
                    panicked.get_or_insert_with(|| join_err.to_string());
                }
            }
        }

        if let Some(err) = ledger_error {
            return Err(err.into());
        }
        if let Some(msg) = panicked {
            return Err(EngineError::TaskPanicked(msg));
        }
        Ok(())
    }

    /// Rolls the execution up to its terminal status and notifies sinks
    /// the first time it becomes terminal.
    pub async fn finalize(&self, ctx: &OrgContext, execution_id: ExecutionId) -> EngineResult<Finalized> {
        self.settle(ctx, execution_id)
    }

    fn settle(&self, ctx: &OrgContext, execution_id: ExecutionId) -> EngineResult<Finalized> {
        let finalized = self.ledger.finalize(ctx, execution_id)?;
        if finalized.changed {
            tracing::info!(
                execution = %execution_id,
                status = %finalized.status,
                succeeded = finalized.summary.succeeded,
                failed = finalized.summary.failed,
                "execution finalized"
            );
            self.events.emit(RotationEvent::ExecutionFinalized {
                execution_id,
                status: finalized.status,
            });
            self.notify(ctx, execution_id);
        }
        Ok(finalized)
    }

    /// Stops dispatching pending records of a running execution. In-flight
    /// records finish normally. Returns `false` if the execution is not
    /// running.
    pub fn cancel(&self, execution_id: ExecutionId) -> bool {
        let Some(running) = self.running.get(&execution_id) else {
            return false;
        };
        running.cancel.cancel();
        tracing::info!(execution = %execution_id, "execution cancelled");
        self.events.emit(RotationEvent::ExecutionCancelled { execution_id });
        true
    }

    /// Deactivates an automation and cancels its running executions.
    /// Returns how many executions were cancelled.
    pub fn deactivate(&self, ctx: &OrgContext, automation_id: AutomationId) -> EngineResult<usize> {
        self.registry.set_active(ctx, automation_id, false)?;
        let ids: Vec<ExecutionId> = self
            .running
            .iter()
            .filter(|r| r.value().automation_id == automation_id)
            .map(|r| *r.key())
            .collect();
        Ok(ids.into_iter().filter(|id| self.cancel(*id)).count())
    }

    /// Executions currently dispatching, optionally for one automation.
    pub fn running_executions(&self, automation_id: Option<AutomationId>) -> Vec<ExecutionId> {
        self.running
            .iter()
            .filter(|r| automation_id.is_none_or(|id| r.value().automation_id == id))
            .map(|r| *r.key())
            .collect()
    }

    pub fn is_running(&self, automation_id: AutomationId) -> bool {
        self.running
            .iter()
            .any(|r| r.value().automation_id == automation_id)
    }

    fn notify(&self, ctx: &OrgContext, execution_id: ExecutionId) {
        if self.sinks.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(execution = %execution_id, "no runtime to deliver notifications");
            return;
        };
        let outcome = match self.outcome(ctx, execution_id) {
            Ok(outcome) => Arc::new(outcome),
            Err(err) => {
                tracing::warn!(execution = %execution_id, error = %err, "could not build notification");
                return;
            }
        };
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let outcome = Arc::clone(&outcome);
            runtime.spawn(async move {
                if let Err(err) = sink.notify(&outcome).await {
                    tracing::warn!(execution = %outcome.execution_id, error = %err, "notification sink failed");
                }
            });
        }
    }

    fn outcome(&self, ctx: &OrgContext, execution_id: ExecutionId) -> EngineResult<ExecutionOutcome> {
        let execution = self.ledger.execution(ctx, execution_id)?;
        let records = self.ledger.records(ctx, execution_id)?;
        let recipients = execution
            .snapshot
            .to_automation()
            .ok()
            .as_ref()
            .and_then(Automation::as_change_secret)
            .map(|c| c.recipients.clone())
            .unwrap_or_default();
        Ok(ExecutionOutcome::new(&execution, &records, recipients))
    }
}
