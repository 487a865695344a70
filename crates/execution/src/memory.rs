//! In-memory execution ledger.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use keyshift_automation::{Account, Automation, AutomationError};
use keyshift_core::{AccountId, AutomationId, ExecutionId, OrgContext, RecordId};
use keyshift_secret::SecretStore;

use crate::error::{LedgerError, LedgerResult};
use crate::execution::AutomationExecution;
use crate::journal::JournalEntry;
use crate::ledger::{ExecutionLedger, Finalized, RecordSummary, RecordUpdate, RevealedSecrets};
use crate::record::ChangeSecretRecord;
use crate::status::{ExecutionStatus, RecordStatus, TriggerKind};
use crate::transition::validate_record_transition;

/// [`ExecutionLedger`] backed by concurrent maps.
///
/// Record updates lock only the record they touch, so workers writing to
/// different records never contend. `finalize` holds the execution entry
/// while it reads record statuses, which serializes it against
/// `create_record` on the same execution. `update_record` touches the
/// execution map only to promote a pending execution, and never while it
/// holds a record entry.
pub struct MemoryLedger {
    store: Arc<dyn SecretStore>,
    executions: DashMap<ExecutionId, AutomationExecution>,
    records: DashMap<RecordId, ChangeSecretRecord>,
    by_execution: DashMap<ExecutionId, Vec<RecordId>>,
    journal: DashMap<ExecutionId, Vec<JournalEntry>>,
}

impl MemoryLedger {
    /// Creates an empty ledger sealing secrets through `store`.
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            executions: DashMap::new(),
            records: DashMap::new(),
            by_execution: DashMap::new(),
            journal: DashMap::new(),
        }
    }

    fn append(&self, execution_id: ExecutionId, entries: impl IntoIterator<Item = JournalEntry>) {
        self.journal.entry(execution_id).or_default().extend(entries);
    }

    fn record_ids(&self, execution_id: ExecutionId) -> Vec<RecordId> {
        self.by_execution
            .get(&execution_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default()
    }

    fn record_statuses(&self, execution_id: ExecutionId) -> Vec<RecordStatus> {
        self.record_ids(execution_id)
            .into_iter()
            .filter_map(|id| self.records.get(&id).map(|r| r.status))
            .collect()
    }

    fn owned_record(&self, ctx: &OrgContext, record_id: RecordId) -> LedgerResult<ChangeSecretRecord> {
        self.records
            .get(&record_id)
            .filter(|r| ctx.owns(r.org_id))
            .map(|r| r.value().clone())
            .ok_or(LedgerError::RecordNotFound(record_id))
    }
}

impl ExecutionLedger for MemoryLedger {
    fn create_execution(
        &self,
        ctx: &OrgContext,
        automation: &Automation,
        trigger: TriggerKind,
    ) -> LedgerResult<AutomationExecution> {
        if !ctx.owns(automation.org_id) {
            return Err(AutomationError::NotFound(automation.id).into());
        }
        let execution = AutomationExecution::new(automation, trigger)?;
        let id = execution.id;
        self.executions.insert(id, execution.clone());
        self.by_execution.insert(id, Vec::new());
        self.append(
            id,
            [JournalEntry::ExecutionCreated {
                timestamp: execution.date_created,
                trigger,
                actor: ctx.actor().to_owned(),
            }],
        );
        tracing::debug!(
            execution_id = %id,
            automation_id = %automation.id,
            %trigger,
            "execution created"
        );
        Ok(execution)
    }

    fn create_record(
        &self,
        ctx: &OrgContext,
        execution_id: ExecutionId,
        account: &Account,
    ) -> LedgerResult<ChangeSecretRecord> {
        let execution = match self.executions.get(&execution_id) {
            Some(e) if ctx.owns(e.org_id) => e,
            _ => return Err(LedgerError::ExecutionNotFound(execution_id)),
        };
        if !execution.snapshot.is_change_secret() {
            return Err(LedgerError::NotChangeSecret(execution_id));
        }
        if execution.status.is_terminal() {
            return Err(LedgerError::ExecutionTerminal {
                execution_id,
                status: execution.status,
            });
        }

        let record = ChangeSecretRecord::new(execution_id, execution.org_id, account);
        self.records.insert(record.id, record.clone());
        self.by_execution
            .entry(execution_id)
            .or_default()
            .push(record.id);
        self.append(
            execution_id,
            [JournalEntry::RecordCreated {
                timestamp: record.date_created,
                record_id: record.id,
                account_id: account.id,
            }],
        );
        drop(execution);
        Ok(record)
    }

    fn mark_running(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<bool> {
        let mut execution = match self.executions.get_mut(&execution_id) {
            Some(e) if ctx.owns(e.org_id) => e,
            _ => return Err(LedgerError::ExecutionNotFound(execution_id)),
        };
        match execution.status {
            ExecutionStatus::Running => Ok(false),
            ExecutionStatus::Pending => {
                execution.transition_status(ExecutionStatus::Running)?;
                drop(execution);
                self.append(
                    execution_id,
                    [JournalEntry::ExecutionStarted {
                        timestamp: Utc::now(),
                    }],
                );
                Ok(true)
            }
            status => Err(LedgerError::ExecutionTerminal {
                execution_id,
                status,
            }),
        }
    }

    fn update_record(
        &self,
        ctx: &OrgContext,
        record_id: RecordId,
        update: RecordUpdate,
    ) -> LedgerResult<ChangeSecretRecord> {
        if update.error.is_some() && update.status != RecordStatus::Failed {
            return Err(LedgerError::InvalidUpdate(format!(
                "error message on a {} record",
                update.status
            )));
        }
        if update.status == RecordStatus::Running {
            let current = self.owned_record(ctx, record_id)?;
            if current.status == RecordStatus::Pending {
                // Taken before the record entry: finalize locks execution then records.
                self.mark_running(ctx, current.execution_id)?;
            }
        }
        let sealed_old = update.old_secret.as_ref().map(|s| self.store.seal(s)).transpose()?;
        let sealed_new = update.new_secret.as_ref().map(|s| self.store.seal(s)).transpose()?;

        let mut record = match self.records.get_mut(&record_id) {
            Some(r) if ctx.owns(r.org_id) => r,
            _ => return Err(LedgerError::RecordNotFound(record_id)),
        };

        if record.status.is_terminal() {
            return Err(LedgerError::RecordTerminal {
                record_id,
                status: record.status,
            });
        }
        let field_write_only =
            update.status == record.status && record.status == RecordStatus::Running;
        if !field_write_only {
            validate_record_transition(record.status, update.status)?;
        }
        if sealed_old.is_some() && record.old_secret.is_some() {
            return Err(LedgerError::ImmutableField {
                record_id,
                field: "old_secret",
            });
        }
        if sealed_new.is_some() && record.new_secret.is_some() {
            return Err(LedgerError::ImmutableField {
                record_id,
                field: "new_secret",
            });
        }
        if sealed_new.is_some() && sealed_old.is_none() && record.old_secret.is_none() {
            return Err(LedgerError::OldSecretNotCaptured(record_id));
        }

        let now = Utc::now();
        let mut entries = Vec::new();
        if !field_write_only {
            record.transition_to(update.status)?;
        }
        if let Some(sealed) = sealed_old {
            record.old_secret = Some(sealed);
            entries.push(JournalEntry::SecretCaptured {
                timestamp: now,
                record_id,
            });
        }
        if let Some(sealed) = sealed_new {
            record.new_secret = Some(sealed);
        }
        if !field_write_only {
            entries.push(match update.status {
                RecordStatus::Running => JournalEntry::RecordStarted {
                    timestamp: now,
                    record_id,
                },
                RecordStatus::Succeeded => JournalEntry::RecordSucceeded {
                    timestamp: now,
                    record_id,
                },
                _ => JournalEntry::RecordFailed {
                    timestamp: now,
                    record_id,
                    error: update.error.clone().unwrap_or_default(),
                },
            });
        }
        if update.error.is_some() {
            record.error = update.error;
        }

        let updated = record.clone();
        drop(record);
        self.append(updated.execution_id, entries);
        Ok(updated)
    }

    fn finalize(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<Finalized> {
        let mut execution = match self.executions.get_mut(&execution_id) {
            Some(e) if ctx.owns(e.org_id) => e,
            _ => return Err(LedgerError::ExecutionNotFound(execution_id)),
        };
        let statuses = self.record_statuses(execution_id);
        let summary = RecordSummary::from_statuses(&statuses);

        if execution.status.is_terminal() {
            return Ok(Finalized {
                status: execution.status,
                changed: false,
                summary,
            });
        }

        let status = match ExecutionStatus::rollup(&statuses) {
            Some(status) => status,
            None => {
                return Err(LedgerError::NotAllRecordsTerminal {
                    execution_id,
                    open: statuses.iter().filter(|s| !s.is_terminal()).count(),
                });
            }
        };
        execution.transition_status(status)?;
        let finished = execution.date_finished.unwrap_or_else(Utc::now);
        drop(execution);

        self.append(
            execution_id,
            [JournalEntry::ExecutionFinalized {
                timestamp: finished,
                status,
                succeeded: summary.succeeded,
                failed: summary.failed,
            }],
        );
        tracing::info!(
            execution_id = %execution_id,
            %status,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "execution finalized"
        );
        Ok(Finalized {
            status,
            changed: true,
            summary,
        })
    }

    fn execution(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<AutomationExecution> {
        self.executions
            .get(&execution_id)
            .filter(|e| ctx.owns(e.org_id))
            .map(|e| e.value().clone())
            .ok_or(LedgerError::ExecutionNotFound(execution_id))
    }

    fn records(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<Vec<ChangeSecretRecord>> {
        self.execution(ctx, execution_id)?;
        Ok(self
            .record_ids(execution_id)
            .into_iter()
            .filter_map(|id| self.records.get(&id).map(|r| r.value().clone()))
            .collect())
    }

    fn record(&self, ctx: &OrgContext, record_id: RecordId) -> LedgerResult<ChangeSecretRecord> {
        self.owned_record(ctx, record_id)
    }

    fn executions_for(&self, ctx: &OrgContext, automation_id: AutomationId) -> Vec<AutomationExecution> {
        let mut out: Vec<AutomationExecution> = self
            .executions
            .iter()
            .filter(|e| ctx.owns(e.org_id) && e.automation_id == automation_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|e| e.date_created);
        out
    }

    fn reveal(&self, ctx: &OrgContext, record_id: RecordId) -> LedgerResult<RevealedSecrets> {
        let record = self.owned_record(ctx, record_id)?;
        tracing::info!(
            record_id = %record_id,
            actor = ctx.actor(),
            "record secrets revealed"
        );
        Ok(RevealedSecrets {
            old_secret: record.old_secret.as_ref().map(|s| self.store.open(s)).transpose()?,
            new_secret: record.new_secret.as_ref().map(|s| self.store.open(s)).transpose()?,
        })
    }

    fn journal(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<Vec<JournalEntry>> {
        self.execution(ctx, execution_id)?;
        Ok(self
            .journal
            .get(&execution_id)
            .map(|j| j.value().clone())
            .unwrap_or_default())
    }

    fn delete_execution(&self, ctx: &OrgContext, execution_id: ExecutionId) -> LedgerResult<usize> {
        self.executions
            .remove_if(&execution_id, |_, e| ctx.owns(e.org_id))
            .ok_or(LedgerError::ExecutionNotFound(execution_id))?;
        let ids = self
            .by_execution
            .remove(&execution_id)
            .map(|(_, ids)| ids)
            .unwrap_or_default();
        let removed = ids.iter().filter(|&id| self.records.remove(id).is_some()).count();
        self.journal.remove(&execution_id);
        tracing::info!(execution_id = %execution_id, records = removed, "execution deleted");
        Ok(removed)
    }

    fn clear_account(&self, ctx: &OrgContext, account_id: AccountId) -> usize {
        let mut touched = 0;
        for mut record in self.records.iter_mut() {
            if ctx.owns(record.org_id) && record.account_id == Some(account_id) {
                record.account_id = None;
                touched += 1;
            }
        }
        touched
    }
}
