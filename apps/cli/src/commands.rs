use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use keyshift_automation::{AutomationRegistry, TargetResolver};
use keyshift_core::OrgContext;
use keyshift_engine::{DryRunBackend, LogSink, RotationOrchestrator, TriggerEvent};
use keyshift_execution::{ExecutionLedger, MemoryLedger};
use keyshift_secret::{PasswordRules, RandomGenerator, SecretGenerator, SecretType};
use serde_json::json;

use crate::config::KeyshiftConfig;
use crate::input;

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn plan(automation: &Path, inventory: &Path, show_secrets: bool) -> Result<()> {
    let automation = input::automation(automation)?;
    let inventory = input::inventory(inventory)?;
    let generator = RandomGenerator;

    let targets = TargetResolver::new(&inventory, &generator).resolve(&automation)?;
    let rows: Vec<_> = targets
        .iter()
        .map(|t| {
            let secret = if show_secrets {
                t.secret.expose_secret(str::to_owned)
            } else {
                t.secret.to_string()
            };
            json!({
                "account_id": t.account.id,
                "asset_id": t.account.asset_id,
                "username": t.account.username,
                "secret_type": t.account.secret_type,
                "secret": secret,
            })
        })
        .collect();
    print_json(&rows)
}

pub fn generate(secret_type: SecretType, length: Option<usize>, no_symbols: bool) -> Result<()> {
    let mut rules = PasswordRules::default();
    if let Some(length) = length {
        rules = rules.with_length(length);
    }
    if no_symbols {
        rules = rules.without_symbols();
    }
    let secret = RandomGenerator.generate(secret_type, &rules)?;
    secret.expose_secret(|s| println!("{}", s.trim_end()));
    Ok(())
}

pub async fn run(config: &KeyshiftConfig, automation: &Path, inventory: &Path, actor: &str) -> Result<()> {
    let automation = input::automation(automation)?;
    let inventory = Arc::new(input::inventory(inventory)?);
    let ctx = OrgContext::new(automation.org_id, actor);

    let registry = Arc::new(AutomationRegistry::new());
    let automation_id = registry.insert(automation)?;
    let ledger = Arc::new(MemoryLedger::new(Arc::new(config.codec()?)));

    let orchestrator = RotationOrchestrator::builder(
        registry,
        inventory,
        ledger.clone(),
        Arc::new(DryRunBackend::new()),
    )
    .sink(Arc::new(LogSink))
    .config(config.orchestrator.clone())
    .build()?;

    let execution_id = orchestrator
        .on_trigger(&ctx, TriggerEvent::manual(automation_id))
        .await
        .context("execution failed")?;

    let execution = ledger.execution(&ctx, execution_id)?;
    let records = ledger.records(&ctx, execution_id)?;
    print_json(&json!({
        "execution": execution,
        "records": records,
    }))
}

pub fn show_config(config: &KeyshiftConfig) -> Result<()> {
    print_json(&config.redacted())
}
