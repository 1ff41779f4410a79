//! TOTP (RFC 6238) provider with encrypted secrets.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use totp_rs::{Algorithm, TOTP};

use keyward_core::crypto::{CryptoValue, OtpKey, OtpProvider};
use keyward_core::error::DomainError;

use crate::aes::ValueCipher;

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP: u64 = 30;
const SECRET_LEN: usize = 20;

/// Issues SHA1/6-digit/30-second TOTP keys.
#[derive(Debug, Clone)]
pub struct TotpProvider {
    issuer: String,
    cipher: Arc<ValueCipher>,
}

impl TotpProvider {
    /// Creates a provider naming `issuer` in provisioning URLs.
    #[must_use]
    pub fn new(issuer: &str, cipher: Arc<ValueCipher>) -> Self {
        Self {
            issuer: issuer.to_owned(),
            cipher,
        }
    }

    fn totp(&self, secret: Vec<u8>, account_name: &str) -> TOTP {
        TOTP::new_unchecked(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            secret,
            Some(self.issuer.clone()),
            account_name.to_owned(),
        )
    }
}

fn unix_seconds(at: DateTime<Utc>) -> Result<u64, DomainError> {
    u64::try_from(at.timestamp())
        .map_err(|_| DomainError::InvalidArgument("time before the unix epoch".into()))
}

impl OtpProvider for TotpProvider {
    fn generate(&self, account_name: &str) -> Result<OtpKey, DomainError> {
        let mut secret = vec![0u8; SECRET_LEN];
        rand::rng().fill(secret.as_mut_slice());

        let totp = TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            secret.clone(),
            Some(self.issuer.clone()),
            account_name.to_owned(),
        )
        .map_err(|e| DomainError::InvalidArgument(format!("invalid otp account: {e}")))?;

        Ok(OtpKey {
            secret: self.cipher.encrypt(&secret)?,
            url: totp.get_url(),
            plain_secret: totp.get_secret_base32(),
        })
    }

    fn validate(
        &self,
        secret: &CryptoValue,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let secret = self.cipher.decrypt(secret)?;
        Ok(self.totp(secret, "").check(code, unix_seconds(now)?))
    }
}
