//! Ledger error types.

use keyshift_automation::AutomationError;
use keyshift_core::{ExecutionId, RecordId};
use keyshift_secret::SecretError;
use thiserror::Error;

use crate::status::{ExecutionStatus, RecordStatus};

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Violations of ledger invariants, plus the storage errors behind them.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Unknown id, or an id owned by another org.
    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    /// Unknown record id, or a record owned by another org.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// Change records only attach to change-secret executions.
    #[error("execution {0} is not a change_secret execution")]
    NotChangeSecret(ExecutionId),

    /// The execution was already finalized.
    #[error("execution {execution_id} is already {status}")]
    ExecutionTerminal {
        /// The finalized execution.
        execution_id: ExecutionId,
        /// Its terminal status.
        status: ExecutionStatus,
    },

    /// The record already reached a terminal status.
    #[error("record {record_id} is already {status}")]
    RecordTerminal {
        /// The settled record.
        record_id: RecordId,
        /// Its terminal status.
        status: RecordStatus,
    },

    /// A status change not allowed by the transition table.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A write-once field was written twice.
    #[error("record {record_id}: {field} is write-once")]
    ImmutableField {
        /// The record written to.
        record_id: RecordId,
        /// Name of the write-once field.
        field: &'static str,
    },

    /// A new secret arrived before the old one was captured.
    #[error("record {0}: new secret written before the old secret was captured")]
    OldSecretNotCaptured(RecordId),

    /// Finalize was called before every record settled.
    #[error("execution {execution_id} still has {open} open records")]
    NotAllRecordsTerminal {
        /// The execution being finalized.
        execution_id: ExecutionId,
        /// Records not yet terminal.
        open: usize,
    },

    /// A malformed [`RecordUpdate`](crate::RecordUpdate).
    #[error("invalid record update: {0}")]
    InvalidUpdate(String),

    /// Sealing or opening a secret failed.
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// The automation could not be snapshotted or is not visible.
    #[error(transparent)]
    Automation(#[from] AutomationError),
}
