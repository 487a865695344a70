//! Layered CLI configuration: defaults, then the TOML file, then
//! `KEYSHIFT_*` environment variables, then flags.

use std::path::Path;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use keyshift_engine::{OrchestratorConfig, SchedulerConfig};
use keyshift_secret::SecretCodec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FILE: &str = "keyshift.toml";

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyshiftConfig {
    pub orchestrator: OrchestratorConfig,
    pub scheduler: SchedulerConfig,
    pub log: keyshift_log::Config,
    pub codec: CodecConfig,
}

impl Default for KeyshiftConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            scheduler: SchedulerConfig::default(),
            log: keyshift_log::Config::default().with_level("warn"),
            codec: CodecConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Base64 of a 32-byte AES-256-GCM key.
    pub key: Option<String>,
}

impl KeyshiftConfig {
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_FILE));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            // KEYSHIFT_LOG and KEYSHIFT_LOG_FORMAT are plain strings, not the
            // `log` table.
            .merge(
                Env::prefixed("KEYSHIFT_")
                    .split("__")
                    .ignore(&["log", "log_format", "config"]),
            )
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path
            && !path.exists()
        {
            bail!("config file {} does not exist", path.display());
        }
        let mut config: Self = Self::figment(path)
            .extract()
            .context("invalid configuration")?;

        if let Ok(level) = std::env::var(keyshift_log::LEVEL_ENV) {
            config.log.level = level;
        }
        if let Ok(format) = std::env::var(keyshift_log::FORMAT_ENV) {
            config.log.format = format.parse()?;
        }
        config.orchestrator.validate()?;
        Ok(config)
    }

    /// Codec for the ledger's secret columns. Without a configured key the
    /// ciphertexts only live as long as the process.
    pub fn codec(&self) -> Result<SecretCodec> {
        match &self.codec.key {
            Some(key) => SecretCodec::from_base64(key).context("codec.key"),
            None => {
                tracing::warn!("no codec.key configured, using an ephemeral key");
                Ok(SecretCodec::ephemeral())
            }
        }
    }

    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.codec.key.is_some() {
            config.codec.key = Some(REDACTED.to_owned());
        }
        config
    }
}
