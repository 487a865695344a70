//! The execution ledger contract.

use keyshift_automation::{Account, Automation};
use keyshift_core::{AccountId, AutomationId, ExecutionId, OrgContext, RecordId, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::execution::AutomationExecution;
use crate::journal::JournalEntry;
use crate::record::ChangeSecretRecord;
use crate::status::{ExecutionStatus, RecordStatus, TriggerKind};

/// Persistent, org-scoped store of executions and their change records.
///
/// Implementations must make each call atomic with respect to the entity
/// it touches: concurrent updates to different records of one execution
/// never lose writes, and a finalize never observes a half-applied update.
pub trait ExecutionLedger: Send + Sync {
    /// Creates a pending execution pinned to a snapshot of `automation`.
    fn create_execution(
        &self,
        ctx: &OrgContext,
        automation: &Automation,
        trigger: TriggerKind,
    ) -> LedgerResult<AutomationExecution>;

    /// Adds a pending record for `account`. The execution must be a
    /// change-secret execution that has not been finalized.
    fn create_record(
        &self,
        ctx: &OrgContext,
        execution_id: ExecutionId,
        account: &Account,
    ) -> LedgerResult<ChangeSecretRecord>;

    /// Moves a pending execution to running. Returns `false` if it was
    /// already running.
    fn mark_running(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<bool>;

    /// Applies one atomic write to a record.
    ///
    /// The first move of a record to `running` also moves a pending
    /// execution to running. Secrets are write-once, and `new_secret` is
    /// rejected until `old_secret` has been captured.
    fn update_record(
        &self,
        ctx: &OrgContext,
        record_id: RecordId,
        update: RecordUpdate,
    ) -> LedgerResult<ChangeSecretRecord>;

    /// Rolls record statuses up into the execution's terminal status.
    ///
    /// Idempotent: finalizing an already-terminal execution returns its
    /// status with `changed == false` and writes nothing.
    fn finalize(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<Finalized>;

    /// Reads one execution.
    fn execution(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<AutomationExecution>;

    /// Records of an execution in creation order.
    fn records(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<Vec<ChangeSecretRecord>>;

    /// Reads one record.
    fn record(&self, ctx: &OrgContext, record_id: RecordId) -> LedgerResult<ChangeSecretRecord>;

    /// Executions of an automation, oldest first.
    fn executions_for(&self, ctx: &OrgContext, automation_id: AutomationId) -> Vec<AutomationExecution>;

    /// Decrypts a record's secrets for an authorized audit read.
    fn reveal(&self, ctx: &OrgContext, record_id: RecordId) -> LedgerResult<RevealedSecrets>;

    /// Audit journal of an execution in write order.
    fn journal(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<Vec<JournalEntry>>;

    /// Deletes an execution and cascades to its records. Returns the number
    /// of records removed.
    fn delete_execution(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<usize>;

    /// Detaches a deleted account from its records. Returns the number of
    /// records touched.
    fn clear_account(&self, ctx: &OrgContext, account_id: AccountId) -> usize;
}

/// One atomic write to a change record.
///
/// `status` equal to the current `running` status writes fields without a
/// transition; every other status must be a legal transition.
#[derive(Debug, Clone)]
pub struct RecordUpdate {
    /// Target status.
    pub status: RecordStatus,
    /// Captured secret, sealed before it is stored.
    pub old_secret: Option<SecretString>,
    /// Secret about to be pushed, sealed before it is stored.
    pub new_secret: Option<SecretString>,
    /// Failure reason. Only valid with [`RecordStatus::Failed`].
    pub error: Option<String>,
}

impl RecordUpdate {
    /// An update to `status` that writes no fields.
    pub fn status(status: RecordStatus) -> Self {
        Self {
            status,
            old_secret: None,
            new_secret: None,
            error: None,
        }
    }

    /// Moves the record to running.
    pub fn running() -> Self {
        Self::status(RecordStatus::Running)
    }

    /// Marks the record succeeded.
    pub fn succeeded() -> Self {
        Self::status(RecordStatus::Succeeded)
    }

    /// Marks the record failed with `error`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::status(RecordStatus::Failed)
        }
    }

    /// Adds the captured secret.
    #[must_use]
    pub fn with_old_secret(mut self, secret: SecretString) -> Self {
        self.old_secret = Some(secret);
        self
    }

    /// Adds the secret about to be pushed.
    #[must_use]
    pub fn with_new_secret(mut self, secret: SecretString) -> Self {
        self.new_secret = Some(secret);
        self
    }
}

/// Record counts of one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    /// All records.
    pub total: usize,
    /// Records that succeeded.
    pub succeeded: usize,
    /// Records that failed.
    pub failed: usize,
}

impl RecordSummary {
    /// Counts `statuses`.
    pub fn from_statuses(statuses: &[RecordStatus]) -> Self {
        Self {
            total: statuses.len(),
            succeeded: statuses.iter().filter(|s| **s == RecordStatus::Succeeded).count(),
            failed: statuses.iter().filter(|s| **s == RecordStatus::Failed).count(),
        }
    }
}

/// Result of [`ExecutionLedger::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalized {
    /// The execution's terminal status.
    pub status: ExecutionStatus,
    /// `false` when the execution was already terminal.
    pub changed: bool,
    /// Record counts the status was rolled up from.
    pub summary: RecordSummary,
}

/// Decrypted record secrets.
#[derive(Debug, Clone)]
pub struct RevealedSecrets {
    /// The secret captured before the push.
    pub old_secret: Option<SecretString>,
    /// The secret that was pushed.
    pub new_secret: Option<SecretString>,
}
