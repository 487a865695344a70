//! Encrypted-at-rest storage seam.
//!
//! The execution ledger never holds plaintext: every old/new secret goes
//! through [`SecretStore::seal`] on write and [`SecretStore::open`] on read.
//! [`crate::SecretCodec`] is the built-in implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{SecretResult, SecretString};

/// Sealed secret value: base64 of `nonce || ciphertext || tag`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedSecret(String);

impl EncryptedSecret {
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_encoded(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedSecret({} bytes)", self.0.len())
    }
}

/// Encrypt-on-write / decrypt-on-read storage for secret values.
pub trait SecretStore: Send + Sync {
    fn seal(&self, secret: &SecretString) -> SecretResult<EncryptedSecret>;

    fn open(&self, sealed: &EncryptedSecret) -> SecretResult<SecretString>;
}
