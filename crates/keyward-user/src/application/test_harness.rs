//! Wiring for handler tests: in-memory log, manual clock, plaintext codes.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use keyward_core::cache::AggregateCache;
use keyward_core::command::CommandContext;
use keyward_event_store::InMemoryEventLog;
use keyward_test_support::{
    InsecureHasher, ManualClock, PlainCodeGenerator, SequenceIdGenerator, StaticOtpProvider,
};

use crate::application::command_handlers::{UserCommandResult, handle_add_human};
use crate::application::services::{CodeGenerators, UserServices};
use crate::domain::aggregates::Profile;
use crate::domain::commands::{AddHuman, NewEmail, NewHuman};
use crate::domain::policy::{PasswordComplexityPolicy, UniquenessPolicy};

pub const INIT_CODE: &str = "INIT42";
pub const EMAIL_CODE: &str = "EMAIL1";
pub const PHONE_CODE: &str = "PHONE1";
pub const PASSWORD_CODE: &str = "RESET1";
pub const OTP_CODE: &str = "123456";
pub const PASSWORD: &str = "Secr3tPass";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

pub struct Harness {
    pub services: UserServices,
    pub clock: Arc<ManualClock>,
    pub log: Arc<InMemoryEventLog>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_uniqueness(UniquenessPolicy::default())
    }

    pub fn with_uniqueness(uniqueness: UniquenessPolicy) -> Self {
        let log = Arc::new(InMemoryEventLog::new());
        let clock = Arc::new(ManualClock::new(start()));
        let services = UserServices {
            log: log.clone(),
            cache: Arc::new(AggregateCache::new(100)),
            clock: clock.clone(),
            ids: Arc::new(SequenceIdGenerator::new("user")),
            codes: CodeGenerators {
                init: Arc::new(PlainCodeGenerator::new(INIT_CODE, Duration::hours(72))),
                email: Arc::new(PlainCodeGenerator::new(EMAIL_CODE, Duration::hours(1))),
                phone: Arc::new(PlainCodeGenerator::new(PHONE_CODE, Duration::hours(1))),
                password: Arc::new(PlainCodeGenerator::new(PASSWORD_CODE, Duration::hours(1))),
            },
            passwords: Arc::new(InsecureHasher),
            otp: Arc::new(StaticOtpProvider::new(OTP_CODE)),
            password_policy: PasswordComplexityPolicy::default(),
            uniqueness,
        };
        Self {
            services,
            clock,
            log,
        }
    }

    pub async fn add_human(
        &self,
        user_name: &str,
        email: &str,
        password: Option<&str>,
    ) -> Result<UserCommandResult, keyward_core::error::DomainError> {
        handle_add_human(&add_human(user_name, email, password), &ctx(), &self.services).await
    }
}

pub fn ctx() -> CommandContext {
    CommandContext::new("admin", "org-1")
}

pub fn profile() -> Profile {
    Profile {
        first_name: "Alice".into(),
        last_name: "Liddell".into(),
        ..Profile::default()
    }
}

pub fn add_human(user_name: &str, email: &str, password: Option<&str>) -> AddHuman {
    AddHuman {
        human: NewHuman {
            user_name: user_name.into(),
            profile: profile(),
            email: NewEmail {
                address: email.into(),
                verified: false,
            },
            phone: None,
            address: None,
            password: password.map(str::to_owned),
            password_change_required: false,
        },
    }
}
