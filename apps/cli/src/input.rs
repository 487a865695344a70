//! JSON input files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use keyshift_automation::{Automation, InventoryFile, MemoryInventory};
use serde::de::DeserializeOwned;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {what} {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {what} {}", path.display()))
}

pub fn automation(path: &Path) -> Result<Automation> {
    let automation: Automation = read_json(path, "automation")?;
    automation
        .validate()
        .with_context(|| format!("automation {}", path.display()))?;
    Ok(automation)
}

pub fn inventory(path: &Path) -> Result<MemoryInventory> {
    let file: InventoryFile = read_json(path, "inventory")?;
    Ok(MemoryInventory::from(file))
}
