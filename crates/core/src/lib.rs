//! # Keyshift Core
//!
//! Shared building blocks for the keyshift crates:
//!
//! - **Identifiers**: [`OrgId`], [`AutomationId`], [`ExecutionId`], [`RecordId`],
//!   [`AccountId`], [`AssetId`], [`NodeId`]
//! - **Tenant context**: [`OrgContext`], passed explicitly to every ledger and
//!   orchestrator call instead of living in ambient state
//! - **Secrets**: [`SecretString`], a zeroizing string that never prints its value
//!
//! ```rust
//! use keyshift_core::{OrgContext, OrgId, SecretString};
//!
//! let ctx = OrgContext::new(OrgId::v4(), "alice");
//! let secret = SecretString::new("hunter2");
//! assert_eq!(format!("{secret:?}"), "[REDACTED]");
//! assert_eq!(ctx.actor(), "alice");
//! ```

pub mod context;
pub mod id;
pub mod secret;

pub use context::OrgContext;
pub use id::*;
pub use secret::SecretString;
