//! # Keyshift Secret
//!
//! Everything that touches secret material on the keyshift side of the wire:
//!
//! - [`SecretType`]: the kind of credential being rotated
//! - [`PasswordRules`] and [`SecretGenerator`]: producing fresh values
//! - [`SecretCodec`]: AES-256-GCM sealing of values at rest
//! - [`SecretStore`]: the encrypt-on-write / decrypt-on-read seam the
//!   execution ledger stores old and new values through
//! - [`ssh`]: Ed25519 key material and OpenSSH public key rendering

pub mod codec;
pub mod error;
pub mod generator;
pub mod rules;
pub mod ssh;
pub mod store;
pub mod types;

pub use codec::SecretCodec;
pub use error::{SecretError, SecretResult};
pub use generator::{RandomGenerator, SecretGenerator};
pub use rules::PasswordRules;
pub use store::{EncryptedSecret, SecretStore};
pub use types::SecretType;

pub use keyshift_core::SecretString;
