//! Engine error types.

use keyshift_automation::{AutomationError, AutomationType};
use keyshift_core::AutomationId;
use keyshift_execution::LedgerError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that stop an execution from being created or completed.
///
/// Per-record backend failures are not errors at this level: they land on
/// the record and roll up into the execution status.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("automation {0} is inactive")]
    AutomationInactive(AutomationId),

    #[error("automation {automation_id} has kind {kind}, which the orchestrator does not run")]
    UnsupportedKind {
        automation_id: AutomationId,
        kind: AutomationType,
    },

    /// Resolution failures, including an empty scope.
    #[error(transparent)]
    Automation(#[from] AutomationError),

    /// A ledger invariant was violated. Fatal for the execution.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

impl EngineError {
    pub fn is_empty_scope(&self) -> bool {
        matches!(self, Self::Automation(AutomationError::EmptyScope { .. }))
    }
}
