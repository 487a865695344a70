//! Execution and record status.

use serde::{Deserialize, Serialize};

/// Overall status of an automation execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, no record dispatched yet.
    Pending,
    /// At least one record has been dispatched.
    Running,
    /// Every record succeeded.
    Succeeded,
    /// Every record failed.
    Failed,
    /// Some records succeeded and some failed.
    Partial,
}

impl ExecutionStatus {
    /// Returns `true` for succeeded, failed and partial.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Partial)
    }

    /// Returns `true` while records are being dispatched.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Rolls record statuses up into a terminal execution status.
    ///
    /// `None` while any record is still open. An execution without records
    /// rotated nothing and counts as failed.
    #[must_use]
    pub fn rollup(records: &[RecordStatus]) -> Option<Self> {
        if records.iter().any(|r| !r.is_terminal()) {
            return None;
        }
        let succeeded = records.iter().filter(|r| **r == RecordStatus::Succeeded).count();
        Some(if succeeded == 0 {
            Self::Failed
        } else if succeeded == records.len() {
            Self::Succeeded
        } else {
            Self::Partial
        })
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

/// Status of a single account's change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Planned, not yet dispatched.
    Pending,
    /// Capture or push in progress.
    Running,
    /// The new secret is installed.
    Succeeded,
    /// Capture or push failed, timed out or was cancelled.
    Failed,
}

impl RecordStatus {
    /// Returns `true` for succeeded and failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What started an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fired by an operator.
    Manual,
    /// Fired by the periodic scheduler.
    Timing,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Timing => write!(f, "timing"),
        }
    }
}
