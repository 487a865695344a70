//! Errors raised while generating, sealing or opening secrets.

use thiserror::Error;

pub type SecretResult<T> = Result<T, SecretError>;

#[derive(Debug, Error)]
pub enum SecretError {
    /// Codec key was not a 32-byte AES-256 key.
    #[error("invalid codec key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext was malformed, tampered with, or sealed under another key.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid password rules: {0}")]
    InvalidRules(String),

    #[error("secret generation failed: {0}")]
    Generation(String),
}
