//! Point-in-time copy of an automation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Automation, AutomationError, AutomationResult, AutomationType};

/// Serialized copy of an automation taken when an execution is created.
///
/// The copy is detached from the live definition: later edits to the
/// automation never show up here. Secret fields are redacted on capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Value);

impl Snapshot {
    pub fn capture(automation: &Automation) -> AutomationResult<Self> {
        serde_json::to_value(automation)
            .map(Self)
            .map_err(|e| AutomationError::Invalid(format!("snapshot serialization: {e}")))
    }

    pub fn automation_type(&self) -> Option<AutomationType> {
        self.0
            .pointer("/kind/type")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn is_change_secret(&self) -> bool {
        self.automation_type() == Some(AutomationType::ChangeSecret)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Rebuilds the automation as it was at capture time. Redacted fields
    /// come back as the literal `[REDACTED]` marker.
    pub fn to_automation(&self) -> AutomationResult<Automation> {
        serde_json::from_value(self.0.clone())
            .map_err(|e| AutomationError::Invalid(format!("snapshot is not an automation: {e}")))
    }
}
