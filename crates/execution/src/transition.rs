//! State machine transition validation for executions and records.

use crate::error::{LedgerError, LedgerResult};
use crate::status::{ExecutionStatus, RecordStatus};

/// Returns `true` if the execution-level transition from `from` to `to` is valid.
///
/// `pending → failed` covers executions cancelled before any record was
/// dispatched.
#[must_use]
pub fn can_transition_execution(from: ExecutionStatus, to: ExecutionStatus) -> bool {
    matches!(
        (from, to),
        (ExecutionStatus::Pending, ExecutionStatus::Running)
            | (ExecutionStatus::Pending, ExecutionStatus::Failed)
            | (ExecutionStatus::Running, ExecutionStatus::Succeeded)
            | (ExecutionStatus::Running, ExecutionStatus::Failed)
            | (ExecutionStatus::Running, ExecutionStatus::Partial)
    )
}

/// Validates an execution transition, returning
/// [`LedgerError::InvalidTransition`] if it is not allowed.
pub fn validate_execution_transition(from: ExecutionStatus, to: ExecutionStatus) -> LedgerResult<()> {
    if can_transition_execution(from, to) {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Returns `true` if the record-level transition from `from` to `to` is valid.
///
/// `pending → failed` covers records that were never dispatched.
#[must_use]
pub fn can_transition_record(from: RecordStatus, to: RecordStatus) -> bool {
    matches!(
        (from, to),
        (RecordStatus::Pending, RecordStatus::Running)
            | (RecordStatus::Pending, RecordStatus::Failed)
            | (RecordStatus::Running, RecordStatus::Succeeded)
            | (RecordStatus::Running, RecordStatus::Failed)
    )
}

/// Validates a record transition, returning
/// [`LedgerError::InvalidTransition`] if it is not allowed.
pub fn validate_record_transition(from: RecordStatus, to: RecordStatus) -> LedgerResult<()> {
    if can_transition_record(from, to) {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
