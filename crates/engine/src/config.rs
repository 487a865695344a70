//! Orchestrator and scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Records of one execution in flight at once.
    pub max_concurrency: usize,
    /// Deadline for one record's capture and push.
    #[serde(with = "humantime_serde")]
    pub record_timeout: Duration,
    /// Extra capture attempts after a retryable backend failure.
    pub capture_retries: u32,
    #[serde(with = "humantime_serde")]
    pub capture_backoff: Duration,
    /// Broadcast buffer for lifecycle events.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            record_timeout: Duration::from_secs(60),
            capture_retries: 0,
            capture_backoff: Duration::from_millis(200),
            event_capacity: 256,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_concurrency == 0 {
            return Err(EngineError::Config("max_concurrency must be at least 1".into()));
        }
        if self.record_timeout.is_zero() {
            return Err(EngineError::Config("record_timeout must be positive".into()));
        }
        if self.event_capacity == 0 {
            return Err(EngineError::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often periodic automations are checked.
    #[serde(with = "humantime_serde")]
    pub tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.record_timeout, Duration::from_secs(60));
        assert_eq!(config.capture_retries, 0);
        config.validate().unwrap();
    }

    #[test]
    fn durations_parse_humantime() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{"record_timeout": "2m 30s", "max_concurrency": 4}"#).unwrap();
        assert_eq!(config.record_timeout, Duration::from_secs(150));
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.capture_backoff, Duration::from_millis(200));

        let scheduler: SchedulerConfig = serde_json::from_str(r#"{"tick": "5s"}"#).unwrap();
        assert_eq!(scheduler.tick, Duration::from_secs(5));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = OrchestratorConfig {
            max_concurrency: 0,
            ..OrchestratorConfig::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }
}
