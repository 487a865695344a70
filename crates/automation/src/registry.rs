//! In-process automation catalogue.

use std::collections::HashMap;

use keyshift_core::{AutomationId, OrgContext};
use parking_lot::RwLock;

use crate::{Automation, AutomationError, AutomationResult};

/// Org-scoped store of automation definitions.
///
/// Names are unique per organization. Lookups through an [`OrgContext`]
/// never see automations owned by another org.
#[derive(Debug, Default)]
pub struct AutomationRegistry {
    automations: RwLock<HashMap<AutomationId, Automation>>,
}

impl AutomationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, automation: Automation) -> AutomationResult<AutomationId> {
        automation.validate()?;
        let mut automations = self.automations.write();
        ensure_unique_name(&automations, &automation)?;
        let id = automation.id;
        tracing::debug!(automation_id = %id, name = %automation.name, "automation registered");
        automations.insert(id, automation);
        Ok(id)
    }

    pub fn get(&self, ctx: &OrgContext, id: AutomationId) -> AutomationResult<Automation> {
        self.automations
            .read()
            .get(&id)
            .filter(|a| ctx.owns(a.org_id))
            .cloned()
            .ok_or(AutomationError::NotFound(id))
    }

    /// Applies `edit` to a copy, validates it, then swaps it in.
    pub fn update<F>(&self, ctx: &OrgContext, id: AutomationId, edit: F) -> AutomationResult<Automation>
    where
        F: FnOnce(&mut Automation),
    {
        let mut automations = self.automations.write();
        let current = automations
            .get(&id)
            .filter(|a| ctx.owns(a.org_id))
            .ok_or(AutomationError::NotFound(id))?;

        let mut next = current.clone();
        edit(&mut next);
        next.id = current.id;
        next.org_id = current.org_id;
        next.touch(ctx.actor());
        next.validate()?;
        ensure_unique_name(&automations, &next)?;

        automations.insert(id, next.clone());
        Ok(next)
    }

    pub fn set_active(&self, ctx: &OrgContext, id: AutomationId, is_active: bool) -> AutomationResult<()> {
        self.update(ctx, id, |a| a.is_active = is_active).map(|_| ())
    }

    pub fn remove(&self, ctx: &OrgContext, id: AutomationId) -> AutomationResult<Automation> {
        let mut automations = self.automations.write();
        match automations.get(&id) {
            Some(a) if ctx.owns(a.org_id) => automations.remove(&id).ok_or(AutomationError::NotFound(id)),
            _ => Err(AutomationError::NotFound(id)),
        }
    }

    /// Automations of the caller's org, ordered by name.
    pub fn list(&self, ctx: &OrgContext) -> Vec<Automation> {
        let mut out: Vec<Automation> = self
            .automations
            .read()
            .values()
            .filter(|a| ctx.owns(a.org_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Active periodic automations across every org.
    pub fn periodic(&self) -> Vec<Automation> {
        let mut out: Vec<Automation> = self
            .automations
            .read()
            .values()
            .filter(|a| a.is_active && a.schedule.is_periodic)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

fn ensure_unique_name(
    automations: &HashMap<AutomationId, Automation>,
    candidate: &Automation,
) -> AutomationResult<()> {
    let clash = automations
        .values()
        .any(|a| a.id != candidate.id && a.org_id == candidate.org_id && a.name == candidate.name);
    if clash {
        return Err(AutomationError::DuplicateName {
            org_id: candidate.org_id,
            name: candidate.name.clone(),
        });
    }
    Ok(())
}
