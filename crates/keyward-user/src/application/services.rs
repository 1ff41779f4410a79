//! Collaborators shared by every user command and query.

use std::sync::Arc;

use keyward_core::cache::AggregateCache;
use keyward_core::clock::Clock;
use keyward_core::crypto::{CodeGenerator, OtpProvider, PasswordHasher};
use keyward_core::event_log::EventLog;
use keyward_core::id::IdGenerator;

use crate::domain::aggregates::User;
use crate::domain::policy::{PasswordComplexityPolicy, UniquenessPolicy};

/// Code generators, one per code kind so each can carry its own lifetime.
#[derive(Clone)]
pub struct CodeGenerators {
    /// Initialization codes.
    pub init: Arc<dyn CodeGenerator>,
    /// Email verification codes.
    pub email: Arc<dyn CodeGenerator>,
    /// Phone verification codes.
    pub phone: Arc<dyn CodeGenerator>,
    /// Password reset codes.
    pub password: Arc<dyn CodeGenerator>,
}

impl CodeGenerators {
    /// Uses `generator` for every code kind.
    #[must_use]
    pub fn uniform(generator: Arc<dyn CodeGenerator>) -> Self {
        Self {
            init: Arc::clone(&generator),
            email: Arc::clone(&generator),
            phone: Arc::clone(&generator),
            password: generator,
        }
    }
}

/// Everything a user command handler needs besides the command itself.
#[derive(Clone)]
pub struct UserServices {
    /// The event log.
    pub log: Arc<dyn EventLog>,
    /// Snapshot cache for users.
    pub cache: Arc<AggregateCache<User>>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Id source for new users.
    pub ids: Arc<dyn IdGenerator>,
    /// Verification code generators.
    pub codes: CodeGenerators,
    /// Password hashing.
    pub passwords: Arc<dyn PasswordHasher>,
    /// TOTP.
    pub otp: Arc<dyn OtpProvider>,
    /// Password rules.
    pub password_policy: PasswordComplexityPolicy,
    /// Scoping of unique values.
    pub uniqueness: UniquenessPolicy,
}

impl std::fmt::Debug for UserServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserServices")
            .field("cache", &self.cache)
            .field("password_policy", &self.password_policy)
            .field("uniqueness", &self.uniqueness)
            .finish_non_exhaustive()
    }
}
