//! # Keyshift Automation
//!
//! Declarative automations and the machinery that turns one into a concrete
//! list of targets:
//!
//! - [`Automation`] and [`AutomationKind`]: a tagged union over gather-facts,
//!   push-account, verify-account and change-secret automations
//! - [`Snapshot`]: the immutable copy an execution is pinned to
//! - [`AutomationRegistry`]: the org-scoped catalogue with name uniqueness
//! - [`Inventory`] and [`MemoryInventory`]: assets, nodes and accounts
//! - [`TargetResolver`]: scope expansion plus secret assignment
//! - [`authorized_keys`]: merge strategies for SSH key rotation

pub mod authorized_keys;
pub mod error;
pub mod inventory;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod snapshot;

pub use error::{AutomationError, AutomationResult};
pub use inventory::{Account, Asset, Inventory, InventoryFile, MemoryInventory};
pub use model::{
    Audit, Automation, AutomationKind, AutomationType, ChangeSecretConfig, Schedule, Scope,
    SecretStrategy, SshKeyChangeStrategy,
};
pub use registry::AutomationRegistry;
pub use resolver::{Target, TargetResolver};
pub use snapshot::Snapshot;
