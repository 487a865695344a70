//! Ed25519 key material for `ssh_key` rotations.
//!
//! Private keys travel as PKCS#8 PEM inside a [`SecretString`]; the public
//! half is rendered as an OpenSSH `authorized_keys` line.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rand::Rng;
use zeroize::Zeroizing;

use crate::{SecretError, SecretResult, SecretString};

pub const KEY_ALGORITHM: &str = "ssh-ed25519";

pub fn generate_private_key() -> SecretResult<SecretString> {
    let seed: Zeroizing<[u8; 32]> = Zeroizing::new(rand::rng().random());
    let key = SigningKey::from_bytes(&seed);
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| SecretError::Generation(format!("pkcs8 encoding: {e}")))?;
    Ok(SecretString::new(pem.as_str()))
}

/// `ssh-ed25519 <base64> <comment>` for the given PKCS#8 private key.
pub fn public_key_line(private_pem: &SecretString, comment: &str) -> SecretResult<String> {
    let key = private_pem
        .expose_secret(SigningKey::from_pkcs8_pem)
        .map_err(|e| SecretError::Generation(format!("not an ed25519 pkcs8 key: {e}")))?;
    let public = key.verifying_key().to_bytes();

    let mut blob = Vec::with_capacity(4 + KEY_ALGORITHM.len() + 4 + public.len());
    write_ssh_string(&mut blob, KEY_ALGORITHM.as_bytes());
    write_ssh_string(&mut blob, &public);

    let mut line = format!("{KEY_ALGORITHM} {}", BASE64.encode(blob));
    if !comment.is_empty() {
        line.push(' ');
        line.push_str(comment);
    }
    Ok(line)
}

fn write_ssh_string(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}
