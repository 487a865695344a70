//! Execution aggregate.

use chrono::{DateTime, Utc};
use keyshift_automation::{Automation, AutomationType, Snapshot};
use keyshift_core::{AutomationId, ExecutionId, OrgId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::status::{ExecutionStatus, TriggerKind};
use crate::transition::validate_execution_transition;

/// One run of an automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationExecution {
    /// Unique execution id.
    pub id: ExecutionId,
    /// Owning organization, copied from the automation.
    pub org_id: OrgId,
    /// The automation that was triggered.
    pub automation_id: AutomationId,
    /// Kind of the automation at trigger time.
    pub automation_type: AutomationType,
    /// Aggregate status.
    pub status: ExecutionStatus,
    /// What started this run.
    pub trigger: TriggerKind,
    /// Automation configuration frozen at creation.
    pub snapshot: Snapshot,
    /// Bumped on every status change.
    pub version: u64,
    /// When the execution was created.
    pub date_created: DateTime<Utc>,
    /// When the first record was dispatched.
    #[serde(default)]
    pub date_start: Option<DateTime<Utc>>,
    /// When the execution became terminal.
    #[serde(default)]
    pub date_finished: Option<DateTime<Utc>>,
}

impl AutomationExecution {
    /// Creates a pending execution with a snapshot of `automation`.
    pub fn new(automation: &Automation, trigger: TriggerKind) -> LedgerResult<Self> {
        Ok(Self {
            id: ExecutionId::v4(),
            org_id: automation.org_id,
            automation_id: automation.id,
            automation_type: automation.automation_type(),
            status: ExecutionStatus::Pending,
            trigger,
            snapshot: Snapshot::capture(automation)?,
            version: 0,
            date_created: Utc::now(),
            date_start: None,
            date_finished: None,
        })
    }

    /// Moves to `new_status`, stamping start and finish times.
    pub fn transition_status(&mut self, new_status: ExecutionStatus) -> LedgerResult<()> {
        validate_execution_transition(self.status, new_status)?;
        self.status = new_status;
        self.version += 1;

        let now = Utc::now();
        if new_status == ExecutionStatus::Running && self.date_start.is_none() {
            self.date_start = Some(now);
        }
        if new_status.is_terminal() {
            self.date_finished = Some(now);
        }
        Ok(())
    }
}
