//! Credential encryption at rest.
//!
//! AES-256-GCM with a random 12-byte nonce prefixed to the ciphertext,
//! the whole blob base64-encoded. The key comes from the operator
//! environment: a base64-encoded 32-byte key is used verbatim, anything
//! else is SHA-256-derived so passphrase-style keys keep working.

use crate::error::{RegistryError, RegistryResult};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Symmetric cipher for API credentials.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Build a cipher from the raw key material in `BOT_ENCRYPTION_KEY`.
    ///
    /// An empty value is a fatal configuration error: the process must
    /// refuse to start rather than store credentials in the clear.
    pub fn from_key_material(material: &str) -> RegistryResult<Self> {
        if material.is_empty() {
            return Err(RegistryError::MissingKey);
        }

        let key_bytes: [u8; 32] = match BASE64.decode(material) {
            Ok(decoded) if decoded.len() == 32 => decoded
                .try_into()
                .expect("length checked above"),
            _ => Sha256::digest(material.as_bytes()).into(),
        };

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        Ok(Self { cipher })
    }

    /// Encrypt a credential string. Empty input stays empty so optional
    /// fields round-trip without producing ciphertext.
    pub fn seal(&self, plaintext: &str) -> RegistryResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| RegistryError::Encrypt(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypt a credential string produced by `seal`.
    pub fn open(&self, sealed: &str) -> RegistryResult<String> {
        if sealed.is_empty() {
            return Ok(String::new());
        }

        let blob = BASE64
            .decode(sealed)
            .map_err(|e| RegistryError::Decrypt(format!("base64: {e}")))?;

        if blob.len() < NONCE_LEN {
            return Err(RegistryError::Decrypt("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| RegistryError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| RegistryError::Decrypt(e.to_string()))
    }
}
