//! `keyshift` operator CLI.

mod commands;
mod config;
mod input;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use keyshift_secret::SecretType;

use crate::config::KeyshiftConfig;

#[derive(Parser, Debug)]
#[command(name = "keyshift", version, about = "Credential rotation for privileged accounts")]
struct Cli {
    /// Config file. Defaults to ./keyshift.toml when present.
    #[arg(long, global = true, env = "KEYSHIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directives, e.g. `keyshift_engine=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve an automation's targets without touching anything
    Plan(PlanArgs),
    /// Print one freshly generated secret
    Generate(GenerateArgs),
    /// Run an automation once against the dry-run backend
    Run(RunArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Automation definition (JSON)
    automation: PathBuf,
    /// Inventory of nodes, assets and accounts (JSON)
    #[arg(long)]
    inventory: PathBuf,
    /// Print secrets in clear text
    #[arg(long, default_value_t = false)]
    show_secrets: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long = "type", value_enum, default_value_t = SecretTypeArg::Password)]
    secret_type: SecretTypeArg,
    /// Password, token or access key length
    #[arg(long)]
    length: Option<usize>,
    /// Leave symbols out of passwords
    #[arg(long, default_value_t = false)]
    no_symbols: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Automation definition (JSON)
    automation: PathBuf,
    /// Inventory of nodes, assets and accounts (JSON)
    #[arg(long)]
    inventory: PathBuf,
    /// Overrides `orchestrator.max_concurrency`
    #[arg(long)]
    max_concurrency: Option<usize>,
    /// Recorded as the actor of the execution
    #[arg(long, default_value = "cli")]
    actor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
enum SecretTypeArg {
    Password,
    SshKey,
    AccessKey,
    Token,
}

impl From<SecretTypeArg> for SecretType {
    fn from(arg: SecretTypeArg) -> Self {
        match arg {
            SecretTypeArg::Password => Self::Password,
            SecretTypeArg::SshKey => Self::SshKey,
            SecretTypeArg::AccessKey => Self::AccessKey,
            SecretTypeArg::Token => Self::Token,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = KeyshiftConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    let _log_guard = keyshift_log::init_with(config.log.clone())?;

    match cli.command {
        Command::Plan(args) => commands::plan(&args.automation, &args.inventory, args.show_secrets),
        Command::Generate(args) => {
            commands::generate(args.secret_type.into(), args.length, args.no_symbols)
        }
        Command::Run(args) => {
            if let Some(n) = args.max_concurrency {
                config.orchestrator.max_concurrency = n;
            }
            commands::run(&config, &args.automation, &args.inventory, &args.actor).await
        }
        Command::Config => commands::show_config(&config),
    }
}
