//! Ports for secret handling: code generation, password hashing and TOTP.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// An opaque encrypted or hashed value as stored in event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoValue {
    /// Algorithm that produced `crypted`, e.g. `aes256gcm` or `bcrypt`.
    pub algorithm: String,
    /// Identifier of the key used, empty for hashes.
    pub key_id: String,
    /// Ciphertext or hash bytes.
    pub crypted: Vec<u8>,
}

/// Output of [`CodeGenerator::generate`].
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    /// Encrypted code, safe to persist.
    pub value: CryptoValue,
    /// Plaintext code, handed to the notification channel only.
    pub plain: String,
    /// Lifetime of the code.
    pub expiry: Duration,
}

/// Keyed generator of expiring verification codes.
pub trait CodeGenerator: Send + Sync {
    /// Generates a fresh code.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if encryption fails.
    fn generate(&self) -> Result<GeneratedCode, DomainError>;

    /// Checks `supplied` against `stored`, failing once
    /// `now > created_at + expiry`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` on expiry or mismatch.
    fn verify(
        &self,
        created_at: DateTime<Utc>,
        expiry: Duration,
        stored: &CryptoValue,
        supplied: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;
}

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hashes `plain`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if hashing fails.
    fn hash(&self, plain: &str) -> Result<CryptoValue, DomainError>;

    /// Compares `plain` against `hashed`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` on mismatch.
    fn verify(&self, hashed: &CryptoValue, plain: &str) -> Result<(), DomainError>;
}

/// A freshly generated TOTP key.
#[derive(Debug, Clone)]
pub struct OtpKey {
    /// Encrypted shared secret, safe to persist.
    pub secret: CryptoValue,
    /// `otpauth://` provisioning URL.
    pub url: String,
    /// Base32 secret for manual entry.
    pub plain_secret: String,
}

/// Time-based one-time password provider.
pub trait OtpProvider: Send + Sync {
    /// Generates a key for `account_name`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if key generation fails.
    fn generate(&self, account_name: &str) -> Result<OtpKey, DomainError>;

    /// Returns whether `code` is valid for `secret` at `now`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the secret cannot be decrypted.
    fn validate(
        &self,
        secret: &CryptoValue,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;
}
