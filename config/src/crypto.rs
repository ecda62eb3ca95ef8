//! Sealing of vendor API keys stored in `settings.toml`.
//!
//! Keys are encrypted with AES-256-GCM. The cipher key is derived from
//! `RELAY_SECRET` when set, otherwise from the hostname and username of the
//! machine running the server, so a copied settings file is useless elsewhere.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12;
const KEY_DOMAIN: &[u8] = b"relay-vendor-credential-v1";

/// Symmetric cipher for credentials at rest.
pub struct CredentialCipher {
    key: [u8; 32],
}

impl CredentialCipher {
    /// Cipher keyed from `RELAY_SECRET`, falling back to the machine identity.
    pub fn from_environment() -> Self {
        match std::env::var("RELAY_SECRET") {
            Ok(secret) if !secret.is_empty() => Self::from_secret(&secret),
            _ => Self::machine_bound(),
        }
    }

    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: derive_key(&[secret.as_bytes()]),
        }
    }

    pub fn machine_bound() -> Self {
        let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string());
        let username = whoami::username();
        Self {
            key: derive_key(&[hostname.as_bytes(), b":", username.as_bytes()]),
        }
    }

    /// Returns base64(nonce || ciphertext).
    pub fn seal(&self, plaintext: &str) -> Result<String, String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| format!("Failed to create cipher: {}", e))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| format!("Encryption failed: {}", e))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(&sealed))
    }

    pub fn open(&self, sealed: &str) -> Result<String, String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| format!("Failed to create cipher: {}", e))?;

        let raw = BASE64
            .decode(sealed)
            .map_err(|e| format!("Failed to decode base64: {}", e))?;
        if raw.len() < NONCE_SIZE {
            return Err("Sealed credential too short".to_string());
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| format!("Decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(|e| format!("Invalid UTF-8 in credential: {}", e))
    }
}

fn derive_key(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_DOMAIN);
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_then_open() {
        let cipher = CredentialCipher::from_secret("unit-test");
        let sealed = cipher.seal("sk-test-12345").expect("seal failed");
        assert_ne!(sealed, "sk-test-12345");
        assert_eq!(cipher.open(&sealed).expect("open failed"), "sk-test-12345");
    }

    #[test]
    fn test_nonce_differs_per_seal() {
        let cipher = CredentialCipher::from_secret("unit-test");
        let a = cipher.seal("same").unwrap();
        let b = cipher.seal("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret_cannot_open() {
        let sealed = CredentialCipher::from_secret("one").seal("key").unwrap();
        assert!(CredentialCipher::from_secret("two").open(&sealed).is_err());
    }

    #[test]
    fn test_open_rejects_garbage() {
        let cipher = CredentialCipher::from_secret("unit-test");
        assert!(cipher.open("not-valid-base64!!!").is_err());
        assert!(cipher.open(&BASE64.encode(b"short")).is_err());
    }
}
