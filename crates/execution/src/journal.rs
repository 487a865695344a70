//! Execution journal for audit.

use chrono::{DateTime, Utc};
use keyshift_core::{AccountId, RecordId};
use serde::{Deserialize, Serialize};

use crate::status::{ExecutionStatus, TriggerKind};

/// A significant event in the life of an execution, in write order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    /// The execution was created from a trigger.
    ExecutionCreated {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// What fired the execution.
        trigger: TriggerKind,
        /// Who fired it.
        actor: String,
    },

    /// The first record was dispatched.
    ExecutionStarted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
    },

    /// A record was planned for an account.
    RecordCreated {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The new record.
        record_id: RecordId,
        /// The targeted account.
        account_id: AccountId,
    },

    /// A record was dispatched to the backend.
    RecordStarted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The dispatched record.
        record_id: RecordId,
    },

    /// The account's current secret was captured and sealed.
    SecretCaptured {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The record holding the captured secret.
        record_id: RecordId,
    },

    /// The new secret was installed.
    RecordSucceeded {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The settled record.
        record_id: RecordId,
    },

    /// The record failed.
    RecordFailed {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The settled record.
        record_id: RecordId,
        /// Error message.
        error: String,
    },

    /// Record statuses were rolled up.
    ExecutionFinalized {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The terminal status.
        status: ExecutionStatus,
        /// Records that succeeded.
        succeeded: usize,
        /// Records that failed.
        failed: usize,
    },
}

impl JournalEntry {
    /// When the event occurred.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ExecutionCreated { timestamp, .. }
            | Self::ExecutionStarted { timestamp }
            | Self::RecordCreated { timestamp, .. }
            | Self::RecordStarted { timestamp, .. }
            | Self::SecretCaptured { timestamp, .. }
            | Self::RecordSucceeded { timestamp, .. }
            | Self::RecordFailed { timestamp, .. }
            | Self::ExecutionFinalized { timestamp, .. } => *timestamp,
        }
    }

    /// Record the entry refers to, if any.
    #[must_use]
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Self::RecordCreated { record_id, .. }
            | Self::RecordStarted { record_id, .. }
            | Self::SecretCaptured { record_id, .. }
            | Self::RecordSucceeded { record_id, .. }
            | Self::RecordFailed { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }
}
