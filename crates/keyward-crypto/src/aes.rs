//! AES-256-GCM encryption of short secrets (codes, TOTP keys).
//!
//! Ciphertext layout is `nonce || ciphertext`, with a fresh 96-bit nonce
//! per value.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use keyward_core::crypto::CryptoValue;
use keyward_core::error::DomainError;
use tracing::warn;

/// Algorithm tag written into [`CryptoValue::algorithm`].
pub const ALGORITHM: &str = "aes256gcm";

const NONCE_LEN: usize = 12;

/// Symmetric cipher bound to one key.
#[derive(Clone)]
pub struct ValueCipher {
    cipher: Aes256Gcm,
    key_id: String,
}

impl std::fmt::Debug for ValueCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCipher")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl ValueCipher {
    /// Creates a cipher from a raw 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the key is not 32 bytes.
    pub fn new(key: &[u8], key_id: &str) -> Result<Self, DomainError> {
        if key.len() != 32 {
            return Err(DomainError::InvalidArgument(format!(
                "encryption key {key_id} must be 32 bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| DomainError::InvalidArgument(format!("invalid encryption key: {e}")))?;
        Ok(Self {
            cipher,
            key_id: key_id.to_owned(),
        })
    }

    /// Creates a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the key does not decode to
    /// 32 bytes.
    pub fn from_base64(encoded: &str, key_id: &str) -> Result<Self, DomainError> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| DomainError::InvalidArgument(format!("key {key_id} is not base64: {e}")))?;
        Self::new(&key, key_id)
    }

    /// Identifier of the key.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Encrypts `plaintext`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if encryption fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<CryptoValue, DomainError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| DomainError::Infrastructure(format!("encryption failed: {e}")))?;

        let mut crypted = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        crypted.extend_from_slice(&nonce);
        crypted.extend_from_slice(&ciphertext);
        Ok(CryptoValue {
            algorithm: ALGORITHM.to_owned(),
            key_id: self.key_id.clone(),
            crypted,
        })
    }

    /// Decrypts a value produced by [`ValueCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the value was produced by
    /// another algorithm or key, or fails authentication.
    pub fn decrypt(&self, value: &CryptoValue) -> Result<Vec<u8>, DomainError> {
        if value.algorithm != ALGORITHM || value.key_id != self.key_id {
            warn!(algorithm = %value.algorithm, key_id = %value.key_id, "value was encrypted with a different key");
            return Err(DomainError::Infrastructure(format!(
                "cannot decrypt {} value with key {}",
                value.algorithm, value.key_id
            )));
        }
        if value.crypted.len() < NONCE_LEN {
            return Err(DomainError::Infrastructure("ciphertext too short".into()));
        }
        let (nonce, ciphertext) = value.crypted.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| DomainError::Infrastructure(format!("decryption failed: {e}")))
    }

    /// Decrypts a value holding UTF-8 text.
    ///
    /// # Errors
    ///
    /// Same as [`ValueCipher::decrypt`], plus non-UTF-8 plaintext.
    pub fn decrypt_string(&self, value: &CryptoValue) -> Result<String, DomainError> {
        String::from_utf8(self.decrypt(value)?)
            .map_err(|e| DomainError::Infrastructure(format!("decrypted value is not text: {e}")))
    }
}
