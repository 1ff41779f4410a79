//! bcrypt password hashing.

use keyward_core::crypto::{CryptoValue, PasswordHasher};
use keyward_core::error::DomainError;
use tracing::debug;

/// Algorithm tag written into [`CryptoValue::algorithm`].
pub const ALGORITHM: &str = "bcrypt";

/// bcrypt ignores every byte after the 72nd.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// bcrypt hasher with a configurable cost.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Creates a hasher. bcrypt accepts costs from 4 to 31.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a cost outside that range.
    pub fn new(cost: u32) -> Result<Self, DomainError> {
        if !(4..=31).contains(&cost) {
            return Err(DomainError::InvalidArgument(format!(
                "bcrypt cost must be between 4 and 31, got {cost}"
            )));
        }
        Ok(Self { cost })
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plain: &str) -> Result<CryptoValue, DomainError> {
        if plain.len() > MAX_PASSWORD_BYTES {
            return Err(DomainError::InvalidArgument(format!(
                "password must not exceed {MAX_PASSWORD_BYTES} bytes"
            )));
        }
        let hashed = bcrypt::hash(plain, self.cost)
            .map_err(|e| DomainError::Infrastructure(format!("password hashing failed: {e}")))?;
        Ok(CryptoValue {
            algorithm: ALGORITHM.to_owned(),
            key_id: String::new(),
            crypted: hashed.into_bytes(),
        })
    }

    fn verify(&self, hashed: &CryptoValue, plain: &str) -> Result<(), DomainError> {
        if hashed.algorithm != ALGORITHM {
            return Err(DomainError::Infrastructure(format!(
                "unsupported password hash algorithm {}",
                hashed.algorithm
            )));
        }
        let encoded = std::str::from_utf8(&hashed.crypted)
            .map_err(|e| DomainError::Infrastructure(format!("corrupt password hash: {e}")))?;
        // Stored hashes never cover more than the limit, so a longer input cannot match.
        if plain.len() > MAX_PASSWORD_BYTES {
            debug!("password longer than bcrypt input limit");
            return Err(DomainError::InvalidArgument("password is invalid".into()));
        }
        match bcrypt::verify(plain, encoded) {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!("password mismatch");
                Err(DomainError::InvalidArgument("password is invalid".into()))
            }
            Err(e) => Err(DomainError::Infrastructure(format!(
                "password verification failed: {e}"
            ))),
        }
    }
}
