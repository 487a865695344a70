//! Subscriber assembly.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::{Config, Format, LogError, LogResult};

#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Keeps the root span with the global fields entered. Hold it for the
/// life of the process.
#[derive(Debug)]
pub struct LoggerGuard {
    _root_span: Option<tracing::span::EnteredSpan>,
}

impl LoggerBuilder {
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parses the level directives without installing anything.
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            directive: self.config.level.clone(),
            reason: e.to_string(),
        })
    }

    /// Installs the global subscriber. Fails if one is already set.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;
        let ansi = self.config.ansi;
        let source = self.config.source;

        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.config.format {
            Format::Pretty => fmt::layer()
                .pretty()
                .with_ansi(ansi)
                .with_file(source)
                .with_line_number(source)
                .with_writer(std::io::stderr)
                .boxed(),
            Format::Compact => fmt::layer()
                .compact()
                .with_ansi(ansi)
                .with_file(source)
                .with_line_number(source)
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed(),
            Format::Json => fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_file(source)
                .with_line_number(source)
                .with_writer(std::io::stderr)
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))?;

        let fields = &self.config.fields;
        let root_span = (!fields.is_empty()).then(|| {
            tracing::info_span!(
                "keyshift",
                service = fields.service.as_deref().unwrap_or(""),
                env = fields.env.as_deref().unwrap_or(""),
                version = fields.version.as_deref().unwrap_or("")
            )
            .entered()
        });

        Ok(LoggerGuard {
            _root_span: root_span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_target_directives() {
        let builder = LoggerBuilder::from_config(Config::default().with_level("keyshift_engine=debug,warn"));
        builder.filter().unwrap();
    }

    #[test]
    fn rejects_malformed_directives() {
        let builder = LoggerBuilder::from_config(Config::default().with_level("keyshift=[bad"));
        let err = builder.filter().unwrap_err();
        assert!(matches!(err, LogError::Filter { ref directive, .. } if directive == "keyshift=[bad"));
    }

    #[test]
    fn second_init_fails() {
        let first = LoggerBuilder::from_config(Config::default().with_level("off")).build();
        let second = LoggerBuilder::from_config(Config::default().with_level("off")).build();
        first.unwrap();
        assert!(matches!(second, Err(LogError::Init(_))));
    }
}
