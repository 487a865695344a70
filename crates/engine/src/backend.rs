//! The transport that reads and writes secrets on target hosts.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use keyshift_automation::{Account, ChangeSecretConfig, SshKeyChangeStrategy, authorized_keys};
use keyshift_core::{AccountId, SecretString};
use keyshift_secret::{SecretType, ssh};

/// Failure talking to a target. Lands on the record as its error message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Transient failures worth another capture attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}

/// How a pushed secret combines with what the target already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Overwrite the credential.
    Replace,
    /// Rewrite `authorized_keys` with the given strategy.
    AuthorizedKeys(SshKeyChangeStrategy),
}

impl MergePolicy {
    pub fn for_config(config: &ChangeSecretConfig) -> Self {
        match config.secret_type {
            SecretType::SshKey => Self::AuthorizedKeys(config.ssh_key_change_strategy),
            _ => Self::Replace,
        }
    }
}

/// Reads and writes account secrets on the asset that owns them.
///
/// Both calls may suspend for as long as the target takes; the orchestrator
/// bounds them with the per-record timeout and drops the future when it
/// fires.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Current secret of `account` on its asset.
    async fn capture_secret(&self, account: &Account) -> Result<SecretString, BackendError>;

    /// Installs `secret` for `account`.
    async fn push_secret(
        &self,
        account: &Account,
        secret: &SecretString,
        policy: MergePolicy,
    ) -> Result<(), BackendError>;
}

/// Backend that keeps target state in memory and never leaves the process.
///
/// Captures return the last pushed value, or a `dry-run:<username>`
/// placeholder for accounts it has not seen.
#[derive(Debug, Default)]
pub struct DryRunBackend {
    secrets: DashMap<AccountId, SecretString>,
    authorized_keys: DashMap<AccountId, String>,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the value the next capture of `account` returns.
    pub fn with_secret(self, account: AccountId, secret: impl Into<SecretString>) -> Self {
        self.secrets.insert(account, secret.into());
        self
    }

    pub fn current_secret(&self, account: AccountId) -> Option<SecretString> {
        self.secrets.get(&account).map(|s| s.value().clone())
    }

    pub fn authorized_keys(&self, account: AccountId) -> Option<String> {
        self.authorized_keys.get(&account).map(|k| k.value().clone())
    }
}

#[async_trait]
impl ExecutionBackend for DryRunBackend {
    async fn capture_secret(&self, account: &Account) -> Result<SecretString, BackendError> {
        Ok(self
            .current_secret(account.id)
            .unwrap_or_else(|| SecretString::new(format!("dry-run:{}", account.username))))
    }

    async fn push_secret(
        &self,
        account: &Account,
        secret: &SecretString,
        policy: MergePolicy,
    ) -> Result<(), BackendError> {
        if let MergePolicy::AuthorizedKeys(strategy) = policy {
            let comment = format!("{}@keyshift", account.username);
            let line = ssh::public_key_line(secret, &comment)
                .map_err(|e| BackendError::Rejected(e.to_string()))?;
            let existing = self.authorized_keys(account.id).unwrap_or_default();
            let merged = authorized_keys::merge(&existing, &line, strategy);
            self.authorized_keys.insert(account.id, merged);
        }
        self.secrets.insert(account.id, secret.clone());
        tracing::debug!(account = %account.id, username = %account.username, ?policy, "dry-run push");
        Ok(())
    }
}
