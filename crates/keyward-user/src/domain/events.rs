//! Domain events for the user identity context.

use keyward_core::crypto::CryptoValue;
use keyward_core::event::EventKind;
use serde::{Deserialize, Serialize};

use super::aggregates::{Address, Profile};

/// Event type for [`UserEventKind::HumanAdded`].
pub const HUMAN_ADDED_EVENT_TYPE: &str = "user.human.added";
/// Event type for [`UserEventKind::HumanRegistered`].
pub const HUMAN_REGISTERED_EVENT_TYPE: &str = "user.human.selfregistered";
/// Event type for [`UserEventKind::MachineAdded`].
pub const MACHINE_ADDED_EVENT_TYPE: &str = "user.machine.added";
/// Event type for [`UserEventKind::MachineChanged`].
pub const MACHINE_CHANGED_EVENT_TYPE: &str = "user.machine.changed";
/// Event type for [`UserEventKind::UsernameChanged`].
pub const USERNAME_CHANGED_EVENT_TYPE: &str = "user.name.changed";
/// Event type for [`UserEventKind::UserDeactivated`].
pub const USER_DEACTIVATED_EVENT_TYPE: &str = "user.deactivated";
/// Event type for [`UserEventKind::UserReactivated`].
pub const USER_REACTIVATED_EVENT_TYPE: &str = "user.reactivated";
/// Event type for [`UserEventKind::UserLocked`].
pub const USER_LOCKED_EVENT_TYPE: &str = "user.locked";
/// Event type for [`UserEventKind::UserUnlocked`].
pub const USER_UNLOCKED_EVENT_TYPE: &str = "user.unlocked";
/// Event type for [`UserEventKind::UserRemoved`].
pub const USER_REMOVED_EVENT_TYPE: &str = "user.removed";
/// Event type for [`UserEventKind::ProfileChanged`].
pub const PROFILE_CHANGED_EVENT_TYPE: &str = "user.human.profile.changed";
/// Event type for [`UserEventKind::EmailChanged`].
pub const EMAIL_CHANGED_EVENT_TYPE: &str = "user.human.email.changed";
/// Event type for [`UserEventKind::EmailVerified`].
pub const EMAIL_VERIFIED_EVENT_TYPE: &str = "user.human.email.verified";
/// Event type for [`UserEventKind::EmailVerificationFailed`].
pub const EMAIL_VERIFICATION_FAILED_EVENT_TYPE: &str = "user.human.email.verification.failed";
/// Event type for [`UserEventKind::EmailCodeAdded`].
pub const EMAIL_CODE_ADDED_EVENT_TYPE: &str = "user.human.email.code.added";
/// Event type for [`UserEventKind::EmailCodeSent`].
pub const EMAIL_CODE_SENT_EVENT_TYPE: &str = "user.human.email.code.sent";
/// Event type for [`UserEventKind::PhoneChanged`].
pub const PHONE_CHANGED_EVENT_TYPE: &str = "user.human.phone.changed";
/// Event type for [`UserEventKind::PhoneRemoved`].
pub const PHONE_REMOVED_EVENT_TYPE: &str = "user.human.phone.removed";
/// Event type for [`UserEventKind::PhoneVerified`].
pub const PHONE_VERIFIED_EVENT_TYPE: &str = "user.human.phone.verified";
/// Event type for [`UserEventKind::PhoneVerificationFailed`].
pub const PHONE_VERIFICATION_FAILED_EVENT_TYPE: &str = "user.human.phone.verification.failed";
/// Event type for [`UserEventKind::PhoneCodeAdded`].
pub const PHONE_CODE_ADDED_EVENT_TYPE: &str = "user.human.phone.code.added";
/// Event type for [`UserEventKind::PhoneCodeSent`].
pub const PHONE_CODE_SENT_EVENT_TYPE: &str = "user.human.phone.code.sent";
/// Event type for [`UserEventKind::AddressChanged`].
pub const ADDRESS_CHANGED_EVENT_TYPE: &str = "user.human.address.changed";
/// Event type for [`UserEventKind::PasswordChanged`].
pub const PASSWORD_CHANGED_EVENT_TYPE: &str = "user.human.password.changed";
/// Event type for [`UserEventKind::PasswordCodeAdded`].
pub const PASSWORD_CODE_ADDED_EVENT_TYPE: &str = "user.human.password.code.added";
/// Event type for [`UserEventKind::PasswordCodeSent`].
pub const PASSWORD_CODE_SENT_EVENT_TYPE: &str = "user.human.password.code.sent";
/// Event type for [`UserEventKind::PasswordCheckSucceeded`].
pub const PASSWORD_CHECK_SUCCEEDED_EVENT_TYPE: &str = "user.human.password.check.succeeded";
/// Event type for [`UserEventKind::PasswordCheckFailed`].
pub const PASSWORD_CHECK_FAILED_EVENT_TYPE: &str = "user.human.password.check.failed";
/// Event type for [`UserEventKind::InitCodeAdded`].
pub const INIT_CODE_ADDED_EVENT_TYPE: &str = "user.human.initialization.code.added";
/// Event type for [`UserEventKind::InitCodeSent`].
pub const INIT_CODE_SENT_EVENT_TYPE: &str = "user.human.initialization.code.sent";
/// Event type for [`UserEventKind::InitCodeVerified`].
pub const INIT_CODE_VERIFIED_EVENT_TYPE: &str = "user.human.initialization.check.succeeded";
/// Event type for [`UserEventKind::InitCodeCheckFailed`].
pub const INIT_CODE_CHECK_FAILED_EVENT_TYPE: &str = "user.human.initialization.check.failed";
/// Event type for [`UserEventKind::OtpAdded`].
pub const OTP_ADDED_EVENT_TYPE: &str = "user.human.mfa.otp.added";
/// Event type for [`UserEventKind::OtpVerified`].
pub const OTP_VERIFIED_EVENT_TYPE: &str = "user.human.mfa.otp.verified";
/// Event type for [`UserEventKind::OtpRemoved`].
pub const OTP_REMOVED_EVENT_TYPE: &str = "user.human.mfa.otp.removed";
/// Event type for [`UserEventKind::OtpCheckSucceeded`].
pub const OTP_CHECK_SUCCEEDED_EVENT_TYPE: &str = "user.human.mfa.otp.check.succeeded";
/// Event type for [`UserEventKind::OtpCheckFailed`].
pub const OTP_CHECK_FAILED_EVENT_TYPE: &str = "user.human.mfa.otp.check.failed";
/// Event type for [`UserEventKind::MfaInitSkipped`].
pub const MFA_INIT_SKIPPED_EVENT_TYPE: &str = "user.human.mfa.init.skipped";

/// A hashed password as carried by events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedPassword {
    /// The hash.
    pub secret: CryptoValue,
    /// The user must replace this password at next login.
    pub change_required: bool,
}

/// An issued verification code as carried by events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCode {
    /// Encrypted code.
    pub code: CryptoValue,
    /// Lifetime in seconds, counted from the event's creation time.
    pub expiry_secs: i64,
}

/// Emitted when an administrator creates a human user, and (as
/// [`UserEventKind::HumanRegistered`]) on self-registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanAdded {
    /// Login name.
    pub user_name: String,
    /// Personal data.
    pub profile: Profile,
    /// Email address (unverified until a verification event follows).
    pub email: String,
    /// Phone number, if any (unverified until a verification event follows).
    pub phone: Option<String>,
    /// Postal address, if any.
    pub address: Option<Address>,
    /// Initial password, if one was supplied.
    pub password: Option<HashedPassword>,
}

/// Emitted when a machine user is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAdded {
    /// Login name.
    pub user_name: String,
    /// Display name of the machine.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// Emitted when a machine user's name or description changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineChanged {
    /// New display name.
    pub name: String,
    /// New description.
    pub description: String,
}

/// Emitted when the login name changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameChanged {
    /// New login name.
    pub user_name: String,
}

/// Emitted when the email address changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailChanged {
    /// New address.
    pub address: String,
}

/// Emitted when the phone number changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneChanged {
    /// New number.
    pub number: String,
}

/// Emitted when an OTP secret is generated (not yet verified).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpAdded {
    /// Encrypted TOTP secret.
    pub secret: CryptoValue,
}

/// Event payload variants for the user identity context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEventKind {
    /// A human user was created by an administrator.
    HumanAdded(HumanAdded),
    /// A human user registered themselves.
    HumanRegistered(HumanAdded),
    /// A machine user was created.
    MachineAdded(MachineAdded),
    /// Machine name or description changed.
    MachineChanged(MachineChanged),
    /// The login name changed.
    UsernameChanged(UsernameChanged),
    /// The user was deactivated.
    UserDeactivated,
    /// The user was reactivated.
    UserReactivated,
    /// The user was locked.
    UserLocked,
    /// The user was unlocked.
    UserUnlocked,
    /// The user was removed. Terminal.
    UserRemoved,
    /// Profile data changed.
    ProfileChanged(Profile),
    /// Email address changed.
    EmailChanged(EmailChanged),
    /// Email address verified.
    EmailVerified,
    /// A wrong or expired email code was supplied.
    EmailVerificationFailed,
    /// An email verification code was issued.
    EmailCodeAdded(IssuedCode),
    /// The email code was delivered.
    EmailCodeSent,
    /// Phone number changed.
    PhoneChanged(PhoneChanged),
    /// Phone number removed.
    PhoneRemoved,
    /// Phone number verified.
    PhoneVerified,
    /// A wrong or expired phone code was supplied.
    PhoneVerificationFailed,
    /// A phone verification code was issued.
    PhoneCodeAdded(IssuedCode),
    /// The phone code was delivered.
    PhoneCodeSent,
    /// Postal address changed.
    AddressChanged(Address),
    /// Password set or changed.
    PasswordChanged(HashedPassword),
    /// A password reset code was issued.
    PasswordCodeAdded(IssuedCode),
    /// The password code was delivered.
    PasswordCodeSent,
    /// A password check succeeded.
    PasswordCheckSucceeded,
    /// A password check failed.
    PasswordCheckFailed,
    /// An initialization code was issued.
    InitCodeAdded(IssuedCode),
    /// The initialization code was delivered.
    InitCodeSent,
    /// The initialization code was verified.
    InitCodeVerified,
    /// A wrong or expired initialization code was supplied.
    InitCodeCheckFailed,
    /// An OTP secret was generated.
    OtpAdded(OtpAdded),
    /// The OTP setup was confirmed with a valid code.
    OtpVerified,
    /// The OTP was removed.
    OtpRemoved,
    /// An OTP check succeeded.
    OtpCheckSucceeded,
    /// An OTP check failed.
    OtpCheckFailed,
    /// The user chose to skip MFA enrollment.
    MfaInitSkipped,
}

impl EventKind for UserEventKind {
    fn event_type(&self) -> &'static str {
        match self {
            Self::HumanAdded(_) => HUMAN_ADDED_EVENT_TYPE,
            Self::HumanRegistered(_) => HUMAN_REGISTERED_EVENT_TYPE,
            Self::MachineAdded(_) => MACHINE_ADDED_EVENT_TYPE,
            Self::MachineChanged(_) => MACHINE_CHANGED_EVENT_TYPE,
            Self::UsernameChanged(_) => USERNAME_CHANGED_EVENT_TYPE,
            Self::UserDeactivated => USER_DEACTIVATED_EVENT_TYPE,
            Self::UserReactivated => USER_REACTIVATED_EVENT_TYPE,
            Self::UserLocked => USER_LOCKED_EVENT_TYPE,
            Self::UserUnlocked => USER_UNLOCKED_EVENT_TYPE,
            Self::UserRemoved => USER_REMOVED_EVENT_TYPE,
            Self::ProfileChanged(_) => PROFILE_CHANGED_EVENT_TYPE,
            Self::EmailChanged(_) => EMAIL_CHANGED_EVENT_TYPE,
            Self::EmailVerified => EMAIL_VERIFIED_EVENT_TYPE,
            Self::EmailVerificationFailed => EMAIL_VERIFICATION_FAILED_EVENT_TYPE,
            Self::EmailCodeAdded(_) => EMAIL_CODE_ADDED_EVENT_TYPE,
            Self::EmailCodeSent => EMAIL_CODE_SENT_EVENT_TYPE,
            Self::PhoneChanged(_) => PHONE_CHANGED_EVENT_TYPE,
            Self::PhoneRemoved => PHONE_REMOVED_EVENT_TYPE,
            Self::PhoneVerified => PHONE_VERIFIED_EVENT_TYPE,
            Self::PhoneVerificationFailed => PHONE_VERIFICATION_FAILED_EVENT_TYPE,
            Self::PhoneCodeAdded(_) => PHONE_CODE_ADDED_EVENT_TYPE,
            Self::PhoneCodeSent => PHONE_CODE_SENT_EVENT_TYPE,
            Self::AddressChanged(_) => ADDRESS_CHANGED_EVENT_TYPE,
            Self::PasswordChanged(_) => PASSWORD_CHANGED_EVENT_TYPE,
            Self::PasswordCodeAdded(_) => PASSWORD_CODE_ADDED_EVENT_TYPE,
            Self::PasswordCodeSent => PASSWORD_CODE_SENT_EVENT_TYPE,
            Self::PasswordCheckSucceeded => PASSWORD_CHECK_SUCCEEDED_EVENT_TYPE,
            Self::PasswordCheckFailed => PASSWORD_CHECK_FAILED_EVENT_TYPE,
            Self::InitCodeAdded(_) => INIT_CODE_ADDED_EVENT_TYPE,
            Self::InitCodeSent => INIT_CODE_SENT_EVENT_TYPE,
            Self::InitCodeVerified => INIT_CODE_VERIFIED_EVENT_TYPE,
            Self::InitCodeCheckFailed => INIT_CODE_CHECK_FAILED_EVENT_TYPE,
            Self::OtpAdded(_) => OTP_ADDED_EVENT_TYPE,
            Self::OtpVerified => OTP_VERIFIED_EVENT_TYPE,
            Self::OtpRemoved => OTP_REMOVED_EVENT_TYPE,
            Self::OtpCheckSucceeded => OTP_CHECK_SUCCEEDED_EVENT_TYPE,
            Self::OtpCheckFailed => OTP_CHECK_FAILED_EVENT_TYPE,
            Self::MfaInitSkipped => MFA_INIT_SKIPPED_EVENT_TYPE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_event_type_lives_in_the_user_namespace() {
        let kinds = [
            UserEventKind::UserLocked,
            UserEventKind::EmailVerified,
            UserEventKind::OtpCheckFailed,
            UserEventKind::UsernameChanged(UsernameChanged {
                user_name: "bob".into(),
            }),
        ];

        for kind in kinds {
            assert!(kind.event_type().starts_with("user."));
            assert!(!kind.event_type().starts_with("user.username."));
        }
    }

    #[test]
    fn test_payload_round_trips_through_json() {
        let kind = UserEventKind::PasswordChanged(HashedPassword {
            secret: CryptoValue {
                algorithm: "bcrypt".into(),
                key_id: String::new(),
                crypted: b"$2b$04$hash".to_vec(),
            },
            change_required: true,
        });

        let payload = kind.to_payload().unwrap();
        let back: UserEventKind = serde_json::from_value(payload).unwrap();

        assert_eq!(back, kind);
    }
}
