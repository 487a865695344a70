//! Password composition rules.

use serde::{Deserialize, Serialize};

use crate::{SecretError, SecretResult};

pub const MIN_LENGTH: usize = 6;
pub const MAX_LENGTH: usize = 128;

pub(crate) const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub(crate) const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub(crate) const DIGITS: &[u8] = b"0123456789";
pub(crate) const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}<>,.?";

/// Length and character-class requirements for generated passwords.
///
/// Each enabled class is guaranteed to appear at least once. Token and
/// access-key generation only honour `length`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRules {
    pub length: usize,
    pub lowercase: bool,
    pub uppercase: bool,
    pub digit: bool,
    pub symbol: bool,
    /// Symbols the target platform refuses, removed from the symbol class.
    pub exclude_symbols: String,
}

impl Default for PasswordRules {
    fn default() -> Self {
        Self {
            length: 16,
            lowercase: true,
            uppercase: true,
            digit: true,
            symbol: true,
            exclude_symbols: String::new(),
        }
    }
}

impl PasswordRules {
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn without_symbols(mut self) -> Self {
        self.symbol = false;
        self
    }

    pub fn validate(&self) -> SecretResult<()> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&self.length) {
            return Err(SecretError::InvalidRules(format!(
                "length must be between {MIN_LENGTH} and {MAX_LENGTH}, got {}",
                self.length
            )));
        }
        let classes = self.classes();
        if classes.is_empty() {
            return Err(SecretError::InvalidRules(
                "at least one character class must be enabled".into(),
            ));
        }
        if classes.iter().any(|c| c.is_empty()) {
            return Err(SecretError::InvalidRules(
                "exclude_symbols removes every symbol".into(),
            ));
        }
        Ok(())
    }

    /// Enabled character classes, each non-empty unless symbols were
    /// excluded away entirely.
    pub(crate) fn classes(&self) -> Vec<Vec<u8>> {
        let mut classes = Vec::with_capacity(4);
        if self.lowercase {
            classes.push(LOWERCASE.to_vec());
        }
        if self.uppercase {
            classes.push(UPPERCASE.to_vec());
        }
        if self.digit {
            classes.push(DIGITS.to_vec());
        }
        if self.symbol {
            let excluded = self.exclude_symbols.as_bytes();
            classes.push(
                SYMBOLS
                    .iter()
                    .copied()
                    .filter(|b| !excluded.contains(b))
                    .collect(),
            );
        }
        classes
    }

    /// Whether `candidate` satisfies length and every enabled class.
    pub fn is_satisfied_by(&self, candidate: &str) -> bool {
        let bytes = candidate.as_bytes();
        bytes.len() == self.length
            && self
                .classes()
                .iter()
                .all(|class| bytes.iter().any(|b| class.contains(b)))
            && bytes
                .iter()
                .all(|b| self.classes().iter().any(|class| class.contains(b)))
    }
}
