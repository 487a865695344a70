//! One account's rotation attempt.

use std::sync::Arc;
use std::time::Duration;

use keyshift_automation::Target;
use keyshift_core::{ExecutionId, OrgContext, RecordId};
use keyshift_execution::{ExecutionLedger, LedgerError, RecordStatus, RecordUpdate};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, ExecutionBackend, MergePolicy};
use crate::events::{EventBus, RotationEvent};
use crate::retry::{CaptureRetry, retry_with_backoff};

pub(crate) const CANCELLED_BEFORE_DISPATCH: &str = "execution cancelled before dispatch";

/// Everything a spawned attempt needs, owned so the task is `'static`.
pub(crate) struct RecordTask {
    pub ctx: OrgContext,
    pub execution_id: ExecutionId,
    pub record_id: RecordId,
    pub target: Target,
    pub policy: MergePolicy,
    pub ledger: Arc<dyn ExecutionLedger>,
    pub backend: Arc<dyn ExecutionBackend>,
    pub events: Arc<EventBus>,
    pub semaphore: Arc<Semaphore>,
    pub cancel: CancellationToken,
    pub retry: CaptureRetry,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordOutcome {
    pub record_id: RecordId,
    pub status: RecordStatus,
}

enum AttemptError {
    Backend(BackendError),
    Ledger(LedgerError),
}

impl From<BackendError> for AttemptError {
    fn from(e: BackendError) -> Self {
        Self::Backend(e)
    }
}

impl From<LedgerError> for AttemptError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl RecordTask {
    /// Drives the record to a terminal status.
    ///
    /// Backend failures and timeouts end up on the record. Only ledger
    /// errors are returned.
    pub async fn run(self) -> Result<RecordOutcome, LedgerError> {
        let Ok(_permit) = self.semaphore.clone().acquire_owned().await else {
            return self.fail(BackendError::Cancelled(CANCELLED_BEFORE_DISPATCH.into()));
        };

        if self.cancel.is_cancelled() {
            return self.fail(BackendError::Cancelled(CANCELLED_BEFORE_DISPATCH.into()));
        }

        self.ledger.mark_running(&self.ctx, self.execution_id)?;
        self.ledger
            .update_record(&self.ctx, self.record_id, RecordUpdate::running())?;

        match tokio::time::timeout(self.timeout, self.attempt()).await {
            Ok(Ok(())) => {
                self.ledger
                    .update_record(&self.ctx, self.record_id, RecordUpdate::succeeded())?;
                tracing::debug!(record = %self.record_id, username = %self.target.account.username, "secret rotated");
                self.events.emit(RotationEvent::RecordSucceeded {
                    execution_id: self.execution_id,
                    record_id: self.record_id,
                });
                Ok(RecordOutcome {
                    record_id: self.record_id,
                    status: RecordStatus::Succeeded,
                })
            }
            Ok(Err(AttemptError::Backend(err))) => self.fail(err),
            Ok(Err(AttemptError::Ledger(err))) => Err(err),
            Err(_) => self.fail(BackendError::Timeout(self.timeout)),
        }
    }

    async fn attempt(&self) -> Result<(), AttemptError> {
        let account = &self.target.account;
        let backend = self.backend.as_ref();

        let old_secret =
            retry_with_backoff(&self.retry, "capture_secret", || backend.capture_secret(account))
                .await?;

        // Both secrets are on the record before the host sees the new one.
        self.ledger.update_record(
            &self.ctx,
            self.record_id,
            RecordUpdate::running()
                .with_old_secret(old_secret)
                .with_new_secret(self.target.secret.clone()),
        )?;

        backend
            .push_secret(account, &self.target.secret, self.policy)
            .await?;
        Ok(())
    }

    fn fail(&self, err: BackendError) -> Result<RecordOutcome, LedgerError> {
        let message = err.to_string();
        tracing::warn!(
            record = %self.record_id,
            username = %self.target.account.username,
            error = %message,
            "rotation attempt failed"
        );
        self.ledger
            .update_record(&self.ctx, self.record_id, RecordUpdate::failed(message.clone()))?;
        self.events.emit(RotationEvent::RecordFailed {
            execution_id: self.execution_id,
            record_id: self.record_id,
            error: message,
        });
        Ok(RecordOutcome {
            record_id: self.record_id,
            status: RecordStatus::Failed,
        })
    }
}
