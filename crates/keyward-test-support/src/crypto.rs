//! Transparent stand-ins for the secret-handling ports.
//!
//! Everything here stores plaintext. Never use outside tests.

use chrono::{DateTime, Duration, Utc};
use keyward_core::crypto::{
    CodeGenerator, CryptoValue, GeneratedCode, OtpKey, OtpProvider, PasswordHasher,
};
use keyward_core::error::DomainError;

const PLAIN: &str = "plain";

fn plain_value(text: &str) -> CryptoValue {
    CryptoValue {
        algorithm: PLAIN.to_owned(),
        key_id: String::new(),
        crypted: text.as_bytes().to_vec(),
    }
}

/// Always issues the same code.
#[derive(Debug, Clone)]
pub struct PlainCodeGenerator {
    code: String,
    expiry: Duration,
}

impl PlainCodeGenerator {
    /// Issues `code`, valid for `expiry`.
    #[must_use]
    pub fn new(code: &str, expiry: Duration) -> Self {
        Self {
            code: code.to_owned(),
            expiry,
        }
    }
}

impl CodeGenerator for PlainCodeGenerator {
    fn generate(&self) -> Result<GeneratedCode, DomainError> {
        Ok(GeneratedCode {
            value: plain_value(&self.code),
            plain: self.code.clone(),
            expiry: self.expiry,
        })
    }

    fn verify(
        &self,
        created_at: DateTime<Utc>,
        expiry: Duration,
        stored: &CryptoValue,
        supplied: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if now > created_at + expiry {
            return Err(DomainError::InvalidArgument("code is expired".into()));
        }
        if stored.crypted == supplied.as_bytes() {
            Ok(())
        } else {
            Err(DomainError::InvalidArgument("code is invalid".into()))
        }
    }
}

/// Stores passwords as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureHasher;

impl PasswordHasher for InsecureHasher {
    fn hash(&self, plain: &str) -> Result<CryptoValue, DomainError> {
        Ok(plain_value(plain))
    }

    fn verify(&self, hashed: &CryptoValue, plain: &str) -> Result<(), DomainError> {
        if hashed.crypted == plain.as_bytes() {
            Ok(())
        } else {
            Err(DomainError::InvalidArgument("password is invalid".into()))
        }
    }
}

/// Accepts exactly one OTP code for every secret.
#[derive(Debug, Clone)]
pub struct StaticOtpProvider {
    valid_code: String,
}

impl StaticOtpProvider {
    /// Accepts `valid_code` and nothing else.
    #[must_use]
    pub fn new(valid_code: &str) -> Self {
        Self {
            valid_code: valid_code.to_owned(),
        }
    }
}

impl OtpProvider for StaticOtpProvider {
    fn generate(&self, account_name: &str) -> Result<OtpKey, DomainError> {
        let secret = format!("secret-for-{account_name}");
        Ok(OtpKey {
            secret: plain_value(&secret),
            url: format!("otpauth://totp/test:{account_name}?secret={secret}"),
            plain_secret: secret,
        })
    }

    fn validate(
        &self,
        _secret: &CryptoValue,
        code: &str,
        _now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        Ok(code == self.valid_code)
    }
}
