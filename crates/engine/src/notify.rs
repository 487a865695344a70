//! Post-finalization notifications.
//!
//! Sinks run detached from the execution. A failing sink is logged and
//! never changes the execution's status.

use async_trait::async_trait;
use keyshift_core::{AutomationId, ExecutionId, OrgId, RecordId};
use keyshift_execution::{
    AutomationExecution, ChangeSecretRecord, ExecutionStatus, RecordStatus, RecordSummary,
};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub record_id: RecordId,
    pub username: String,
    pub error: String,
}

/// Summary handed to every sink once an execution reaches a terminal
/// status. Carries no secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub execution_id: ExecutionId,
    pub org_id: OrgId,
    pub automation_id: AutomationId,
    pub automation_name: String,
    pub status: ExecutionStatus,
    pub summary: RecordSummary,
    pub failures: Vec<RecordFailure>,
    pub recipients: Vec<String>,
}

impl ExecutionOutcome {
    pub fn new(
        execution: &AutomationExecution,
        records: &[ChangeSecretRecord],
        recipients: Vec<String>,
    ) -> Self {
        let statuses: Vec<RecordStatus> = records.iter().map(|r| r.status).collect();
        let failures = records
            .iter()
            .filter(|r| r.status == RecordStatus::Failed)
            .map(|r| RecordFailure {
                record_id: r.id,
                username: r.username.clone(),
                error: r.error.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            execution_id: execution.id,
            org_id: execution.org_id,
            automation_id: execution.automation_id,
            automation_name: execution.snapshot.name().unwrap_or_default().to_owned(),
            status: execution.status,
            summary: RecordSummary::from_statuses(&statuses),
            failures,
            recipients,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, outcome: &ExecutionOutcome) -> Result<(), NotifyError>;
}

/// Writes the outcome to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, outcome: &ExecutionOutcome) -> Result<(), NotifyError> {
        tracing::info!(
            execution = %outcome.execution_id,
            automation = %outcome.automation_name,
            status = %outcome.status,
            total = outcome.summary.total,
            succeeded = outcome.summary.succeeded,
            failed = outcome.summary.failed,
            recipients = outcome.recipients.len(),
            "change secret execution finished"
        );
        for failure in &outcome.failures {
            tracing::warn!(
                execution = %outcome.execution_id,
                record = %failure.record_id,
                username = %failure.username,
                error = %failure.error,
                "account rotation failed"
            );
        }
        Ok(())
    }
}

/// Republishes outcomes on a broadcast channel for in-process consumers.
/// Outcomes sent while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<ExecutionOutcome>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionOutcome> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn notify(&self, outcome: &ExecutionOutcome) -> Result<(), NotifyError> {
        let _ = self.sender.send(outcome.clone());
        Ok(())
    }
}
