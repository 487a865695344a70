//! Logger configuration and presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LogError;

pub const LEVEL_ENV: &str = "KEYSHIFT_LOG";
pub const FORMAT_ENV: &str = "KEYSHIFT_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl FromStr for Format {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(LogError::Format(other.to_owned())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Fields attached to every event through a root span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fields {
    pub service: Option<String>,
    pub env: Option<String>,
    pub version: Option<String>,
}

impl Fields {
    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.env.is_none() && self.version.is_none()
    }

    pub fn from_env() -> Self {
        Self {
            service: std::env::var("KEYSHIFT_SERVICE").ok(),
            env: std::env::var("KEYSHIFT_ENV").ok(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `EnvFilter` directives.
    pub level: String,
    pub format: Format,
    pub ansi: bool,
    /// Include file and line of the call site.
    pub source: bool,
    pub fields: Fields,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: Format::Compact,
            ansi: true,
            source: false,
            fields: Fields::default(),
        }
    }
}

impl Config {
    pub(crate) fn env_configured() -> bool {
        std::env::var_os(LEVEL_ENV).is_some() || std::env::var_os("RUST_LOG").is_some()
    }

    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var(LEVEL_ENV).or_else(|_| std::env::var("RUST_LOG")) {
            config.level = level;
        }
        if let Some(format) = std::env::var(FORMAT_ENV).ok().and_then(|f| f.parse().ok()) {
            config.format = format;
        }
        config.fields = Fields::from_env();
        config
    }

    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_owned(),
            format: Format::Pretty,
            source: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn production() -> Self {
        Self {
            format: Format::Json,
            ansi: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.fields.service = Some(service.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("pretty", Format::Pretty)]
    #[case("COMPACT", Format::Compact)]
    #[case(" json ", Format::Json)]
    fn parses_formats(#[case] input: &str, #[case] expected: Format) {
        assert_eq!(input.parse::<Format>().unwrap(), expected);
    }

    #[test]
    fn unknown_format_is_an_error() {
        let err = "logfmt".parse::<Format>().unwrap_err();
        assert_eq!(err.to_string(), "unknown log format 'logfmt'");
    }

    #[test]
    fn presets() {
        let dev = Config::development();
        assert_eq!(dev.level, "debug");
        assert_eq!(dev.format, Format::Pretty);
        assert!(dev.source);

        let prod = Config::production();
        assert_eq!(prod.level, "info");
        assert_eq!(prod.format, Format::Json);
        assert!(!prod.ansi);
    }

    #[test]
    fn deserializes_partial_config() {
        let config: Config = serde_json::from_str(r#"{"level": "warn", "format": "json"}"#).unwrap();
        assert_eq!(
            config,
            Config {
                level: "warn".into(),
                format: Format::Json,
                ..Config::default()
            }
        );
    }

    #[test]
    fn fields_emptiness() {
        assert!(Fields::default().is_empty());
        assert!(!Config::default().with_service("keyshift").fields.is_empty());
    }
}
