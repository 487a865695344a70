//! Tenant context for ledger and orchestrator calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::OrgId;

/// Organization scope and acting principal for one request.
///
/// Every read and write in the execution ledger is filtered by
/// [`OrgContext::org_id`]; there is no process-global "current org".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgContext {
    org_id: OrgId,
    actor: String,
    trace_id: Uuid,
    timestamp: DateTime<Utc>,
}

impl OrgContext {
    /// Context for a human or API caller.
    pub fn new(org_id: OrgId, actor: impl Into<String>) -> Self {
        Self {
            org_id,
            actor: actor.into(),
            trace_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    /// Context used by the periodic scheduler.
    pub fn system(org_id: OrgId) -> Self {
        Self::new(org_id, "system")
    }

    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether `org_id` is visible from this context.
    pub fn owns(&self, org_id: OrgId) -> bool {
        self.org_id == org_id
    }
}
