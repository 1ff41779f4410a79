//! Encrypted, expiring verification codes.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use rand::Rng;

use keyward_core::crypto::{CodeGenerator, CryptoValue, GeneratedCode};
use keyward_core::error::DomainError;

use crate::aes::ValueCipher;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"~!@#$^&*()_+=-][}{|;:,./?><";

/// Shape and lifetime of one kind of code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CodeConfig {
    /// Number of characters.
    pub length: usize,
    /// Lifetime of a generated code.
    pub expiry: Duration,
    /// Use `a-z`.
    pub include_lower: bool,
    /// Use `A-Z`.
    pub include_upper: bool,
    /// Use `0-9`.
    pub include_digits: bool,
    /// Use punctuation.
    pub include_symbols: bool,
}

impl CodeConfig {
    /// Six upper-case letters and digits valid for `expiry`.
    #[must_use]
    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            length: 6,
            expiry,
            include_lower: false,
            include_upper: true,
            include_digits: true,
            include_symbols: false,
        }
    }

    /// Init codes live for three days.
    #[must_use]
    pub fn init_code() -> Self {
        Self::with_expiry(Duration::hours(72))
    }

    /// Email, phone and password codes live for one hour.
    #[must_use]
    pub fn verification_code() -> Self {
        Self::with_expiry(Duration::hours(1))
    }

    fn alphabet(&self) -> Vec<u8> {
        let mut alphabet = Vec::new();
        for (enabled, chars) in [
            (self.include_lower, LOWER),
            (self.include_upper, UPPER),
            (self.include_digits, DIGITS),
            (self.include_symbols, SYMBOLS),
        ] {
            if enabled {
                alphabet.extend_from_slice(chars);
            }
        }
        alphabet
    }
}

/// Generates random codes from a [`CodeConfig`] and stores them encrypted.
#[derive(Debug, Clone)]
pub struct EncryptedCodeGenerator {
    config: CodeConfig,
    cipher: Arc<ValueCipher>,
}

impl EncryptedCodeGenerator {
    /// Creates a generator.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the config yields an empty
    /// alphabet or a zero length.
    pub fn new(config: CodeConfig, cipher: Arc<ValueCipher>) -> Result<Self, DomainError> {
        if config.length == 0 || config.alphabet().is_empty() {
            return Err(DomainError::InvalidArgument(
                "code config must have a length and at least one character class".into(),
            ));
        }
        Ok(Self { config, cipher })
    }
}

impl CodeGenerator for EncryptedCodeGenerator {
    fn generate(&self) -> Result<GeneratedCode, DomainError> {
        let alphabet = self.config.alphabet();
        let mut rng = rand::rng();
        let plain: String = (0..self.config.length)
            .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
            .collect();
        let value = self.cipher.encrypt(plain.as_bytes())?;
        Ok(GeneratedCode {
            value,
            plain,
            expiry: self.config.expiry,
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
        let expected = self.cipher.decrypt(stored)?;
        if constant_time_eq(&expected, supplied.as_bytes()) {
            Ok(())
        } else {
            Err(DomainError::InvalidArgument("code is invalid".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn generator(config: CodeConfig) -> EncryptedCodeGenerator {
        let cipher = Arc::new(ValueCipher::new(&[3u8; 32], "codes").unwrap());
        EncryptedCodeGenerator::new(config, cipher).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_generated_code_matches_config() {
        let generator = generator(CodeConfig::verification_code());

        let code = generator.generate().unwrap();

        assert_eq!(code.plain.len(), 6);
        assert!(
            code.plain
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
        assert_eq!(code.expiry, Duration::hours(1));
    }

    #[test]
    fn test_verify_accepts_correct_code_until_expiry() {
        let generator = generator(CodeConfig::verification_code());
        let code = generator.generate().unwrap();

        let at_boundary = generator.verify(t0(), code.expiry, &code.value, &code.plain, t0() + code.expiry);

        assert!(at_boundary.is_ok());
    }

    #[test]
    fn test_verify_rejects_expired_code_even_if_correct() {
        let generator = generator(CodeConfig::verification_code());
        let code = generator.generate().unwrap();
        let later = t0() + code.expiry + Duration::seconds(1);

        let result = generator.verify(t0(), code.expiry, &code.value, &code.plain, later);

        match result {
            Err(DomainError::InvalidArgument(msg)) => assert_eq!(msg, "code is expired"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_rejects_wrong_code() {
        let generator = generator(CodeConfig::init_code());
        let code = generator.generate().unwrap();

        let result = generator.verify(t0(), code.expiry, &code.value, "WRONG1", t0());

        match result {
            Err(DomainError::InvalidArgument(msg)) => assert_eq!(msg, "code is invalid"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_alphabet_is_rejected() {
        let config = CodeConfig {
            include_upper: false,
            include_digits: false,
            ..CodeConfig::init_code()
        };
        let cipher = Arc::new(ValueCipher::new(&[3u8; 32], "codes").unwrap());

        assert!(EncryptedCodeGenerator::new(config, cipher).is_err());
    }
}
