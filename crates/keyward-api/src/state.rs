//! Shared application state.

use std::sync::Arc;

use keyward_core::cache::AggregateCache;
use keyward_core::clock::SystemClock;
use keyward_core::event_log::EventLog;
use keyward_core::id::UuidV7Generator;
use keyward_crypto::{BcryptHasher, CodeConfig, EncryptedCodeGenerator, TotpProvider, ValueCipher};
use keyward_user::application::services::{CodeGenerators, UserServices};
use keyward_user::domain::policy::{PasswordComplexityPolicy, UniquenessPolicy};

use crate::config::Config;
use crate::error::AppError;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Collaborators of the user context.
    pub users: UserServices,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(users: UserServices) -> Self {
        Self { users }
    }

    /// Wires the production collaborators around `log`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a key is malformed or the bcrypt cost
    /// is out of range.
    pub fn from_config(config: &Config, log: Arc<dyn EventLog>) -> Result<Self, AppError> {
        let code_cipher = Arc::new(
            ValueCipher::from_base64(&config.code_key, "code")
                .map_err(|e| AppError::Config(e.to_string()))?,
        );
        let otp_cipher = Arc::new(
            ValueCipher::from_base64(&config.otp_key, "otp")
                .map_err(|e| AppError::Config(e.to_string()))?,
        );
        let code = |ttl| {
            EncryptedCodeGenerator::new(CodeConfig::with_expiry(ttl), Arc::clone(&code_cipher))
                .map(Arc::new)
        };
        let passwords =
            BcryptHasher::new(config.password_cost).map_err(|e| AppError::Config(e.to_string()))?;

        let users = UserServices {
            log,
            cache: Arc::new(AggregateCache::new(config.cache_capacity)),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidV7Generator),
            codes: CodeGenerators {
                init: code(config.init_code_ttl)?,
                email: code(config.email_code_ttl)?,
                phone: code(config.phone_code_ttl)?,
                password: code(config.password_code_ttl)?,
            },
            passwords: Arc::new(passwords),
            otp: Arc::new(TotpProvider::new(&config.otp_issuer, otp_cipher)),
            password_policy: PasswordComplexityPolicy::default(),
            uniqueness: UniquenessPolicy {
                username_scope: config.username_scope,
            },
        };
        Ok(Self::new(users))
    }
}
