//! Automation definitions.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use keyshift_core::{AssetId, AutomationId, NodeId, OrgId, SecretString};
use keyshift_secret::{PasswordRules, SecretType};
use serde::{Deserialize, Serialize};

use crate::{AutomationError, AutomationResult};

/// Account selector matching every account on the scoped assets.
pub const ALL_ACCOUNTS: &str = "@ALL";

pub const DEFAULT_INTERVAL_HOURS: u32 = 24;

/// A declarative, org-scoped automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    pub org_id: OrgId,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub audit: Audit,
    pub kind: AutomationKind,
}

fn default_active() -> bool {
    true
}

impl Automation {
    pub fn new(org_id: OrgId, name: impl Into<String>, kind: AutomationKind) -> Self {
        Self {
            id: AutomationId::v4(),
            org_id,
            name: name.into(),
            is_active: true,
            comment: String::new(),
            schedule: Schedule::default(),
            scope: Scope::default(),
            audit: Audit::default(),
            kind,
        }
    }

    pub fn change_secret(org_id: OrgId, name: impl Into<String>, config: ChangeSecretConfig) -> Self {
        Self::new(org_id, name, AutomationKind::ChangeSecret(config))
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        let actor = actor.into();
        self.audit.created_by = Some(actor.clone());
        self.audit.updated_by = Some(actor);
        self
    }

    pub fn automation_type(&self) -> AutomationType {
        self.kind.automation_type()
    }

    pub fn as_change_secret(&self) -> Option<&ChangeSecretConfig> {
        match &self.kind {
            AutomationKind::ChangeSecret(config) => Some(config),
            _ => None,
        }
    }

    /// Records an edit by `actor`.
    pub fn touch(&mut self, actor: &str) {
        self.audit.updated_by = Some(actor.to_owned());
        self.audit.date_updated = Utc::now();
    }

    pub fn validate(&self) -> AutomationResult<()> {
        if self.name.trim().is_empty() {
            return Err(AutomationError::Invalid("name must not be empty".into()));
        }
        self.schedule.validate()?;
        if let AutomationKind::ChangeSecret(config) = &self.kind
            && config.secret_strategy != SecretStrategy::Specific
            && config.secret_type == SecretType::Password
        {
            config.password_rules.validate()?;
        }
        Ok(())
    }
}

/// Discriminator of [`AutomationKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationType {
    GatherFacts,
    PushAccount,
    VerifyAccount,
    ChangeSecret,
}

impl AutomationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GatherFacts => "gather_facts",
            Self::PushAccount => "push_account",
            Self::VerifyAccount => "verify_account",
            Self::ChangeSecret => "change_secret",
        }
    }
}

impl fmt::Display for AutomationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific configuration. Only change-secret carries a payload here;
/// the other kinds are defined by their scope alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutomationKind {
    GatherFacts,
    PushAccount,
    VerifyAccount,
    ChangeSecret(ChangeSecretConfig),
}

impl AutomationKind {
    pub fn automation_type(&self) -> AutomationType {
        match self {
            Self::GatherFacts => AutomationType::GatherFacts,
            Self::PushAccount => AutomationType::PushAccount,
            Self::VerifyAccount => AutomationType::VerifyAccount,
            Self::ChangeSecret(_) => AutomationType::ChangeSecret,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSecretConfig {
    #[serde(default)]
    pub secret_type: SecretType,
    #[serde(default)]
    pub secret_strategy: SecretStrategy,
    /// Value pushed by the `specific` strategy. Serializes redacted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretString>,
    #[serde(default)]
    pub password_rules: PasswordRules,
    #[serde(default)]
    pub ssh_key_change_strategy: SshKeyChangeStrategy,
    /// Users notified when an execution finalizes.
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Default for ChangeSecretConfig {
    fn default() -> Self {
        Self {
            secret_type: SecretType::Password,
            secret_strategy: SecretStrategy::Specific,
            secret: None,
            password_rules: PasswordRules::default(),
            ssh_key_change_strategy: SshKeyChangeStrategy::Add,
            recipients: Vec::new(),
        }
    }
}

impl ChangeSecretConfig {
    pub fn specific(secret: impl Into<SecretString>) -> Self {
        Self {
            secret_strategy: SecretStrategy::Specific,
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    pub fn random_one(rules: PasswordRules) -> Self {
        Self {
            secret_strategy: SecretStrategy::RandomOne,
            password_rules: rules,
            ..Self::default()
        }
    }

    pub fn random_all(rules: PasswordRules) -> Self {
        Self {
            secret_strategy: SecretStrategy::RandomAll,
            password_rules: rules,
            ..Self::default()
        }
    }

    pub fn with_secret_type(mut self, secret_type: SecretType) -> Self {
        self.secret_type = secret_type;
        self
    }

    pub fn with_ssh_key_strategy(mut self, strategy: SshKeyChangeStrategy) -> Self {
        self.ssh_key_change_strategy = strategy;
        self
    }

    pub fn with_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients = recipients.into_iter().map(Into::into).collect();
        self
    }
}

/// How new secret values are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretStrategy {
    /// Every target gets the configured secret.
    #[default]
    Specific,
    /// One generated value shared by every target of the execution.
    RandomOne,
    /// An independently generated value per target.
    RandomAll,
}

/// How a new SSH public key lands in `authorized_keys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SshKeyChangeStrategy {
    /// Append, keeping every existing key.
    #[default]
    Add,
    /// Replace every existing key.
    Set,
    /// Replace only keys previously installed by keyshift.
    SetJms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub is_periodic: bool,
    /// Period in hours.
    #[serde(default = "default_interval")]
    pub interval: Option<u32>,
    #[serde(default)]
    pub crontab: Option<String>,
}

fn default_interval() -> Option<u32> {
    Some(DEFAULT_INTERVAL_HOURS)
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            is_periodic: false,
            interval: default_interval(),
            crontab: None,
        }
    }
}

impl Schedule {
    pub fn every_hours(hours: u32) -> Self {
        Self {
            is_periodic: true,
            interval: Some(hours),
            crontab: None,
        }
    }

    pub fn crontab(expr: impl Into<String>) -> Self {
        Self {
            is_periodic: true,
            interval: None,
            crontab: Some(expr.into()),
        }
    }

    /// Interval period, when the schedule is periodic and interval driven.
    /// A crontab takes precedence over the interval.
    pub fn period(&self) -> Option<Duration> {
        if !self.is_periodic || self.crontab.is_some() {
            return None;
        }
        self.interval.map(|h| Duration::hours(i64::from(h)))
    }

    pub fn validate(&self) -> AutomationResult<()> {
        if self.interval == Some(0) {
            return Err(AutomationError::Invalid("interval must be at least one hour".into()));
        }
        if self.is_periodic && self.interval.is_none() && self.crontab.is_none() {
            return Err(AutomationError::Invalid(
                "periodic automation needs an interval or a crontab".into(),
            ));
        }
        Ok(())
    }
}

/// Assets, nodes and account selectors an automation applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub assets: Vec<AssetId>,
    #[serde(default)]
    pub nodes: Vec<NodeId>,
}

impl Scope {
    pub fn all_accounts() -> Self {
        Self {
            accounts: vec![ALL_ACCOUNTS.to_owned()],
            ..Self::default()
        }
    }

    pub fn with_accounts<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_assets(mut self, assets: impl IntoIterator<Item = AssetId>) -> Self {
        self.assets = assets.into_iter().collect();
        self
    }

    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.nodes = nodes.into_iter().collect();
        self
    }

    /// Whether `username` is picked by the account selectors.
    pub fn selects(&self, username: &str) -> bool {
        self.accounts
            .iter()
            .any(|s| s == ALL_ACCOUNTS || s == username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl Default for Audit {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_by: None,
            updated_by: None,
            date_created: now,
            date_updated: now,
        }
    }
}
