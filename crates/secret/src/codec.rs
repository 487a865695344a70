//! AES-256-GCM codec for secrets at rest.
//!
//! Each seal draws a fresh 96-bit nonce which is prepended to the
//! ciphertext, so sealing the same value twice yields different output.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use zeroize::Zeroizing;

use crate::store::{EncryptedSecret, SecretStore};
use crate::{SecretError, SecretResult, SecretString};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

#[derive(Clone)]
pub struct SecretCodec {
    cipher: Aes256Gcm,
}

impl SecretCodec {
    /// Codec from a base64-encoded 32-byte key.
    pub fn from_base64(key_base64: &str) -> SecretResult<Self> {
        let key_bytes = Zeroizing::new(
            BASE64
                .decode(key_base64.trim())
                .map_err(|e| SecretError::InvalidKey(format!("invalid base64: {e}")))?,
        );
        Self::from_bytes(&key_bytes)
    }

    pub fn from_bytes(key_bytes: &[u8]) -> SecretResult<Self> {
        if key_bytes.len() != KEY_SIZE {
            tracing::error!(expected = KEY_SIZE, got = key_bytes.len(), "rejected codec key");
            return Err(SecretError::InvalidKey(format!(
                "expected {KEY_SIZE} bytes, got {}",
                key_bytes.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key_bytes)
            .map_err(|e| SecretError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Codec under a freshly generated key. Values sealed by it cannot be
    /// opened after the process exits.
    pub fn ephemeral() -> Self {
        tracing::debug!("using ephemeral codec key");
        let key = Self::generate_key();
        Self {
            cipher: Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&key[..])),
        }
    }

    pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::rng().fill(&mut key[..]);
        key
    }

    pub fn generate_key_base64() -> String {
        BASE64.encode(&Self::generate_key()[..])
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> SecretResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| SecretError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, sealed: &[u8]) -> SecretResult<Zeroizing<Vec<u8>>> {
        if sealed.len() < NONCE_SIZE {
            return Err(SecretError::Decryption("ciphertext too short".into()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| {
                tracing::warn!(len = sealed.len(), "secret failed authentication on decrypt");
                SecretError::Decryption(e.to_string())
            })?;
        Ok(Zeroizing::new(plaintext))
    }
}

impl SecretStore for SecretCodec {
    fn seal(&self, secret: &SecretString) -> SecretResult<EncryptedSecret> {
        let sealed = secret.expose_secret(|plain| self.encrypt(plain.as_bytes()))?;
        Ok(EncryptedSecret::from_encoded(BASE64.encode(sealed)))
    }

    fn open(&self, sealed: &EncryptedSecret) -> SecretResult<SecretString> {
        let raw = BASE64
            .decode(sealed.as_encoded())
            .map_err(|e| SecretError::Decryption(format!("invalid base64: {e}")))?;
        let plaintext = self.decrypt(&raw)?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|e| SecretError::Decryption(format!("not utf-8: {e}")))?;
        Ok(SecretString::new(text))
    }
}

impl fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}
