//! Automation errors.

use keyshift_core::{AutomationId, OrgId};
use keyshift_secret::SecretError;
use thiserror::Error;

use crate::AutomationType;

pub type AutomationResult<T> = Result<T, AutomationError>;

#[derive(Debug, Error)]
pub enum AutomationError {
    /// Scope expanded to zero eligible accounts.
    #[error("automation {automation_id} resolved to an empty scope")]
    EmptyScope { automation_id: AutomationId },

    /// `specific` strategy with no configured secret.
    #[error("automation {automation_id} uses the specific strategy but has no secret")]
    MissingSecret { automation_id: AutomationId },

    #[error("automation name {name:?} already exists in org {org_id}")]
    DuplicateName { org_id: OrgId, name: String },

    #[error("automation not found: {0}")]
    NotFound(AutomationId),

    #[error("automation {automation_id} is a {kind} automation, not change_secret")]
    NotChangeSecret {
        automation_id: AutomationId,
        kind: AutomationType,
    },

    #[error("invalid automation: {0}")]
    Invalid(String),

    #[error(transparent)]
    Secret(#[from] SecretError),
}
