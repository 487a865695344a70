//! Fresh secret values.

use rand::seq::{IndexedRandom, SliceRandom};

use crate::rules::{DIGITS, LOWERCASE, MAX_LENGTH, MIN_LENGTH, UPPERCASE};
use crate::{PasswordRules, SecretError, SecretResult, SecretString, SecretType, ssh};

/// Produces new secret values for a rotation.
///
/// The orchestrator calls this once per execution for `random_one` and
/// once per target for `random_all`.
pub trait SecretGenerator: Send + Sync {
    fn generate(&self, secret_type: SecretType, rules: &PasswordRules)
    -> SecretResult<SecretString>;
}

/// Thread-local CSPRNG backed generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
    pub fn password(rules: &PasswordRules) -> SecretResult<SecretString> {
        rules.validate()?;
        let classes = rules.classes();
        let mut rng = rand::rng();

        let mut chars: Vec<u8> = Vec::with_capacity(rules.length);
        for class in &classes {
            chars.push(pick(class, &mut rng)?);
        }
        let pool: Vec<u8> = classes.concat();
        while chars.len() < rules.length {
            chars.push(pick(&pool, &mut rng)?);
        }
        chars.shuffle(&mut rng);

        String::from_utf8(chars)
            .map(SecretString::new)
            .map_err(|e| SecretError::Generation(e.to_string()))
    }

    /// Alphanumeric string of `length` characters, used for tokens and
    /// access keys.
    pub fn alphanumeric(length: usize) -> SecretResult<SecretString> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
            return Err(SecretError::InvalidRules(format!(
                "length must be between {MIN_LENGTH} and {MAX_LENGTH}, got {length}"
            )));
        }
        let pool = [LOWERCASE, UPPERCASE, DIGITS].concat();
        let mut rng = rand::rng();
        let chars = (0..length)
            .map(|_| pick(&pool, &mut rng).map(char::from))
            .collect::<SecretResult<String>>()?;
        Ok(SecretString::new(chars))
    }
}

impl SecretGenerator for RandomGenerator {
    fn generate(
        &self,
        secret_type: SecretType,
        rules: &PasswordRules,
    ) -> SecretResult<SecretString> {
        let generated = match secret_type {
            SecretType::Password => Self::password(rules),
            SecretType::Token | SecretType::AccessKey => Self::alphanumeric(rules.length),
            SecretType::SshKey => ssh::generate_private_key(),
        };
        if let Err(err) = &generated {
            tracing::warn!(%secret_type, error = %err, "secret generation failed");
        }
        generated
    }
}

fn pick(pool: &[u8], rng: &mut impl rand::Rng) -> SecretResult<u8> {
    pool.choose(rng)
        .copied()
        .ok_or_else(|| SecretError::Generation("empty character pool".into()))
}
