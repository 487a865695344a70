//! Per-account change record.

use chrono::{DateTime, Utc};
use keyshift_automation::Account;
use keyshift_core::{AccountId, AssetId, ExecutionId, OrgId, RecordId};
use keyshift_secret::EncryptedSecret;
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::status::RecordStatus;
use crate::transition::validate_record_transition;

/// Audit row for one account in one change-secret execution.
///
/// `old_secret` and `new_secret` are sealed and write-once. `account_id`
/// is cleared when the account is deleted; the record itself outlives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSecretRecord {
    /// Unique record id.
    pub id: RecordId,
    /// Owning execution. Deleting it deletes the record.
    pub execution_id: ExecutionId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Target account, `None` once the account is deleted.
    pub account_id: Option<AccountId>,
    /// Asset the account lives on.
    pub asset_id: AssetId,
    /// Account username at planning time.
    pub username: String,
    /// Per-record status.
    pub status: RecordStatus,
    /// Secret captured from the target before the push.
    #[serde(default)]
    pub old_secret: Option<EncryptedSecret>,
    /// Secret pushed to the target.
    #[serde(default)]
    pub new_secret: Option<EncryptedSecret>,
    /// Failure reason. Only set on failed records.
    #[serde(default)]
    pub error: Option<String>,
    /// When the record was planned.
    pub date_created: DateTime<Utc>,
    /// When the record was dispatched.
    #[serde(default)]
    pub date_started: Option<DateTime<Utc>>,
    /// When the record settled.
    #[serde(default)]
    pub date_finished: Option<DateTime<Utc>>,
}

impl ChangeSecretRecord {
    /// Creates a pending record targeting `account`.
    pub fn new(execution_id: ExecutionId, org_id: OrgId, account: &Account) -> Self {
        Self {
            id: RecordId::v4(),
            execution_id,
            org_id,
            account_id: Some(account.id),
            asset_id: account.asset_id,
            username: account.username.clone(),
            status: RecordStatus::Pending,
            old_secret: None,
            new_secret: None,
            error: None,
            date_created: Utc::now(),
            date_started: None,
            date_finished: None,
        }
    }

    /// Moves to `new_status`, stamping start and finish times.
    pub fn transition_to(&mut self, new_status: RecordStatus) -> LedgerResult<()> {
        validate_record_transition(self.status, new_status)?;
        self.status = new_status;

        let now = Utc::now();
        if new_status == RecordStatus::Running && self.date_started.is_none() {
            self.date_started = Some(now);
        }
        if new_status.is_terminal() {
            self.date_finished = Some(now);
        }
        Ok(())
    }
}
