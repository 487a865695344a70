//! # Keyshift Log
//!
//! One-call `tracing` setup shared by the keyshift binaries.
//!
//! ```no_run
//! let _guard = keyshift_log::auto_init().expect("logger");
//! tracing::info!("ready");
//! ```
//!
//! The level filter uses `EnvFilter` directives (`info`,
//! `keyshift_engine=debug,warn`). `KEYSHIFT_LOG` overrides `RUST_LOG`;
//! `KEYSHIFT_LOG_FORMAT` picks `pretty`, `compact` or `json`.

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, FORMAT_ENV, Fields, Format, LEVEL_ENV};
pub use error::{LogError, LogResult};

/// Initializes with the default config.
pub fn init() -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(Config::default()).build()
}

pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Environment config when `KEYSHIFT_LOG` or `RUST_LOG` is set, otherwise
/// the development preset in debug builds and the production preset in
/// release builds.
pub fn auto_init() -> LogResult<LoggerGuard> {
    let config = if Config::env_configured() {
        Config::from_env()
    } else if cfg!(debug_assertions) {
        Config::development()
    } else {
        Config::production()
    };
    init_with(config)
}
