// SPDX-License-Identifier: MIT
//! AEAD envelope used by the vault: AES-256-GCM with a fresh random 96-bit
//! nonce per write, stored as `nonce ∥ ciphertext`.

use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, AeadCore, Key, Nonce};
use base64::Engine;

use crate::error::{Result, VaultError};

/// Sentinel key id used when the operator has configured no encryption key
/// at all.
pub const PLAINTEXT_KEY_ID: &str = "plaintext";

const NONCE_LEN: usize = 12;

fn load_key(key_id: &str, keys: &HashMap<String, String>) -> Result<Aes256Gcm> {
    let encoded = keys
        .get(key_id)
        .ok_or_else(|| VaultError::MissingKey(key_id.to_string()))?;
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| VaultError::InvalidKey(key_id.to_string(), e.to_string()))?;
    if raw.len() != 32 {
        return Err(VaultError::InvalidKey(
            key_id.to_string(),
            format!("expected 32 bytes, got {}", raw.len()),
        ));
    }
    let key = Key::<Aes256Gcm>::from_slice(&raw);
    Ok(Aes256Gcm::new(key))
}

/// Encrypt `plaintext` under `key_id`. When `key_id` is [`PLAINTEXT_KEY_ID`]
/// the bytes are returned unchanged (plaintext mode).
pub fn encrypt(plaintext: &[u8], key_id: &str, keys: &HashMap<String, String>) -> Result<Vec<u8>> {
    if key_id == PLAINTEXT_KEY_ID {
        return Ok(plaintext.to_vec());
    }
    let cipher = load_key(key_id, keys)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::InvalidKey(key_id.to_string(), e.to_string()))?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decryption failure is deliberately its own error type distinct from
/// [`VaultError`]: a decryption failure degrades the read to `None`, it is
/// never surfaced as a propagating error.
#[derive(Debug)]
pub struct DecryptFailed;

/// Decrypt `stored` (as produced by [`encrypt`]) under `key_id`.
pub fn decrypt(
    stored: &[u8],
    key_id: &str,
    keys: &HashMap<String, String>,
) -> std::result::Result<Vec<u8>, DecryptFailed> {
    if key_id == PLAINTEXT_KEY_ID {
        return Ok(stored.to_vec());
    }
    let cipher = load_key(key_id, keys).map_err(|_| DecryptFailed)?;
    if stored.len() < NONCE_LEN {
        return Err(DecryptFailed);
    }
    let (nonce_bytes, ciphertext) = stored.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher.decrypt(nonce, ciphertext).map_err(|_| DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyset(id: &str) -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert(id.to_string(), base64::engine::general_purpose::STANDARD.encode([7u8; 32]));
        m
    }

    #[test]
    fn round_trips_under_same_key() {
        let keys = keyset("v1");
        let ct = encrypt(b"hello", "v1", &keys).unwrap();
        let pt = decrypt(&ct, "v1", &keys).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn two_encryptions_use_distinct_nonces() {
        let keys = keyset("v1");
        let a = encrypt(b"hello", "v1", &keys).unwrap();
        let b = encrypt(b"hello", "v1", &keys).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_mode_roundtrips_unchanged() {
        let keys = HashMap::new();
        let ct = encrypt(b"raw", PLAINTEXT_KEY_ID, &keys).unwrap();
        assert_eq!(ct, b"raw");
        let pt = decrypt(&ct, PLAINTEXT_KEY_ID, &keys).unwrap();
        assert_eq!(pt, b"raw");
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let mut keys = keyset("v1");
        keys.insert("v2".to_string(), base64::engine::general_purpose::STANDARD.encode([9u8; 32]));
        let ct = encrypt(b"hello", "v1", &keys).unwrap();
        assert!(decrypt(&ct, "v2", &keys).is_err());
    }

    #[test]
    fn decrypt_missing_key_fails() {
        let keys = keyset("v1");
        let ct = encrypt(b"hello", "v1", &keys).unwrap();
        assert!(decrypt(&ct, "v2", &keys).is_err());
    }
}
