//! Commands for the user identity context.
//!
//! Every command names its target user by id (except creation, which
//! receives a fresh id). Who issues it and for which tenant travels
//! separately in a [`CommandContext`](keyward_core::command::CommandContext).

use keyward_core::command::Command;

use super::aggregates::{Address, Profile};

/// Email supplied at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmail {
    /// Address.
    pub address: String,
    /// Ownership was already proven elsewhere.
    pub verified: bool,
}

/// Phone supplied at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhone {
    /// Number.
    pub number: String,
    /// Ownership was already proven elsewhere.
    pub verified: bool,
}

/// Human data supplied at creation or registration.
#[derive(Clone, PartialEq, Eq)]
pub struct NewHuman {
    /// Login name.
    pub user_name: String,
    /// Personal data.
    pub profile: Profile,
    /// Email.
    pub email: NewEmail,
    /// Optional phone.
    pub phone: Option<NewPhone>,
    /// Optional postal address.
    pub address: Option<Address>,
    /// Optional initial password in plaintext.
    pub password: Option<String>,
    /// Initial password must be changed at first login.
    pub password_change_required: bool,
}

impl std::fmt::Debug for NewHuman {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewHuman")
            .field("user_name", &self.user_name)
            .field("email", &self.email.address)
            .field("has_password", &self.password.is_some())
            .finish_non_exhaustive()
    }
}

/// Command to create a human user on behalf of an administrator.
#[derive(Debug, Clone)]
pub struct AddHuman {
    /// The human to create.
    pub human: NewHuman,
}

/// Command for a human registering themselves.
#[derive(Debug, Clone)]
pub struct RegisterHuman {
    /// The human to create.
    pub human: NewHuman,
}

/// Command to create a machine user.
#[derive(Debug, Clone)]
pub struct AddMachine {
    /// Login name.
    pub user_name: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
}

/// Command to change the login name.
#[derive(Debug, Clone)]
pub struct ChangeUsername {
    /// Target user.
    pub user_id: String,
    /// New login name.
    pub user_name: String,
}

/// Command to deactivate a user.
#[derive(Debug, Clone)]
pub struct DeactivateUser {
    /// Target user.
    pub user_id: String,
}

/// Command to reactivate a deactivated user.
#[derive(Debug, Clone)]
pub struct ReactivateUser {
    /// Target user.
    pub user_id: String,
}

/// Command to lock a user.
#[derive(Debug, Clone)]
pub struct LockUser {
    /// Target user.
    pub user_id: String,
}

/// Command to unlock a locked user.
#[derive(Debug, Clone)]
pub struct UnlockUser {
    /// Target user.
    pub user_id: String,
}

/// Command to remove a user and free its unique values.
#[derive(Debug, Clone)]
pub struct RemoveUser {
    /// Target user.
    pub user_id: String,
}

/// Command to replace a human's profile.
#[derive(Debug, Clone)]
pub struct ChangeProfile {
    /// Target user.
    pub user_id: String,
    /// New profile.
    pub profile: Profile,
}

/// Command to change a machine's name and description.
#[derive(Debug, Clone)]
pub struct ChangeMachine {
    /// Target user.
    pub user_id: String,
    /// New display name.
    pub name: String,
    /// New description.
    pub description: String,
}

/// Command to change the email address.
#[derive(Debug, Clone)]
pub struct ChangeEmail {
    /// Target user.
    pub user_id: String,
    /// New address.
    pub address: String,
    /// Ownership was already proven elsewhere.
    pub verified: bool,
}

/// Command to verify the email address with a code.
#[derive(Debug, Clone)]
pub struct VerifyEmail {
    /// Target user.
    pub user_id: String,
    /// Plaintext code.
    pub code: String,
}

/// Command to issue a fresh email verification code.
#[derive(Debug, Clone)]
pub struct CreateEmailVerificationCode {
    /// Target user.
    pub user_id: String,
}

/// Command to change the phone number.
#[derive(Debug, Clone)]
pub struct ChangePhone {
    /// Target user.
    pub user_id: String,
    /// New number.
    pub number: String,
    /// Ownership was already proven elsewhere.
    pub verified: bool,
}

/// Command to verify the phone number with a code.
#[derive(Debug, Clone)]
pub struct VerifyPhone {
    /// Target user.
    pub user_id: String,
    /// Plaintext code.
    pub code: String,
}

/// Command to issue a fresh phone verification code.
#[derive(Debug, Clone)]
pub struct CreatePhoneVerificationCode {
    /// Target user.
    pub user_id: String,
}

/// Command to remove the phone number.
#[derive(Debug, Clone)]
pub struct RemovePhone {
    /// Target user.
    pub user_id: String,
}

/// Command to replace the postal address.
#[derive(Debug, Clone)]
pub struct ChangeAddress {
    /// Target user.
    pub user_id: String,
    /// New address.
    pub address: Address,
}

/// Command to set a new password using a password reset code.
#[derive(Clone)]
pub struct SetPassword {
    /// Target user.
    pub user_id: String,
    /// Plaintext reset code.
    pub code: String,
    /// New plaintext password.
    pub password: String,
}

/// Command for an administrator to set a password the user must change.
#[derive(Clone)]
pub struct SetOneTimePassword {
    /// Target user.
    pub user_id: String,
    /// New plaintext password.
    pub password: String,
}

/// Command to change the password, proving the old one.
#[derive(Clone)]
pub struct ChangePassword {
    /// Target user.
    pub user_id: String,
    /// Current plaintext password.
    pub old_password: String,
    /// New plaintext password.
    pub new_password: String,
}

/// Command to check a password at login.
#[derive(Clone)]
pub struct CheckPassword {
    /// Target user.
    pub user_id: String,
    /// Plaintext password.
    pub password: String,
}

/// Command to issue a password reset code.
#[derive(Debug, Clone)]
pub struct RequestSetPassword {
    /// Target user.
    pub user_id: String,
}

/// Command to issue a fresh initialization code.
#[derive(Debug, Clone)]
pub struct CreateInitCode {
    /// Target user.
    pub user_id: String,
}

/// Command to complete initialization with the init code.
#[derive(Clone)]
pub struct VerifyInitCode {
    /// Target user.
    pub user_id: String,
    /// Plaintext init code.
    pub code: String,
    /// Optional first password.
    pub password: Option<String>,
}

/// Which code a [`MarkCodeSent`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// Initialization code.
    Init,
    /// Email verification code.
    Email,
    /// Phone verification code.
    Phone,
    /// Password reset code.
    Password,
}

/// Command recording that a code was delivered to the user.
#[derive(Debug, Clone)]
pub struct MarkCodeSent {
    /// Target user.
    pub user_id: String,
    /// Delivered code.
    pub kind: CodeKind,
}

/// Command to start TOTP enrollment.
#[derive(Debug, Clone)]
pub struct AddOtp {
    /// Target user.
    pub user_id: String,
    /// Account label for authenticator apps; defaults to the email.
    pub account_name: Option<String>,
}

/// Command to confirm TOTP enrollment with a first code.
#[derive(Debug, Clone)]
pub struct CheckOtpSetup {
    /// Target user.
    pub user_id: String,
    /// Six-digit code.
    pub code: String,
}

/// Command to check a TOTP code at login.
#[derive(Debug, Clone)]
pub struct CheckOtp {
    /// Target user.
    pub user_id: String,
    /// Six-digit code.
    pub code: String,
}

/// Command to remove TOTP enrollment.
#[derive(Debug, Clone)]
pub struct RemoveOtp {
    /// Target user.
    pub user_id: String,
}

/// Command recording that the user postponed MFA enrollment.
#[derive(Debug, Clone)]
pub struct SkipMfaInit {
    /// Target user.
    pub user_id: String,
}

macro_rules! redacted_debug {
    ($($ty:ident { $($field:ident),* }),* $(,)?) => {
        $(
            impl std::fmt::Debug for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.debug_struct(stringify!($ty))
                        $(.field(stringify!($field), &self.$field))*
                        .finish_non_exhaustive()
                }
            }
        )*
    };
}

redacted_debug!(
    SetPassword { user_id },
    SetOneTimePassword { user_id },
    ChangePassword { user_id },
    CheckPassword { user_id },
    VerifyInitCode { user_id },
);

macro_rules! command_types {
    ($($ty:ident => $name:literal),* $(,)?) => {
        $(
            impl Command for $ty {
                fn command_type(&self) -> &'static str {
                    $name
                }
            }
        )*
    };
}

command_types!(
    AddHuman => "user.add_human",
    RegisterHuman => "user.register_human",
    AddMachine => "user.add_machine",
    ChangeUsername => "user.change_username",
    DeactivateUser => "user.deactivate",
    ReactivateUser => "user.reactivate",
    LockUser => "user.lock",
    UnlockUser => "user.unlock",
    RemoveUser => "user.remove",
    ChangeProfile => "user.change_profile",
    ChangeMachine => "user.change_machine",
    ChangeEmail => "user.change_email",
    VerifyEmail => "user.verify_email",
    CreateEmailVerificationCode => "user.create_email_verification_code",
    ChangePhone => "user.change_phone",
    VerifyPhone => "user.verify_phone",
    CreatePhoneVerificationCode => "user.create_phone_verification_code",
    RemovePhone => "user.remove_phone",
    ChangeAddress => "user.change_address",
    SetPassword => "user.set_password",
    SetOneTimePassword => "user.set_one_time_password",
    ChangePassword => "user.change_password",
    CheckPassword => "user.check_password",
    RequestSetPassword => "user.request_set_password",
    CreateInitCode => "user.create_init_code",
    VerifyInitCode => "user.verify_init_code",
    MarkCodeSent => "user.mark_code_sent",
    AddOtp => "user.add_otp",
    CheckOtpSetup => "user.check_otp_setup",
    CheckOtp => "user.check_otp",
    RemoveOtp => "user.remove_otp",
    SkipMfaInit => "user.skip_mfa_init",
);

/// Every user command, for exhaustive dispatch.
#[derive(Debug, Clone)]
pub enum UserCommand {
    /// See [`AddHuman`].
    AddHuman(AddHuman),
    /// See [`RegisterHuman`].
    RegisterHuman(RegisterHuman),
    /// See [`AddMachine`].
    AddMachine(AddMachine),
    /// See [`ChangeUsername`].
    ChangeUsername(ChangeUsername),
    /// See [`DeactivateUser`].
    Deactivate(DeactivateUser),
    /// See [`ReactivateUser`].
    Reactivate(ReactivateUser),
    /// See [`LockUser`].
    Lock(LockUser),
    /// See [`UnlockUser`].
    Unlock(UnlockUser),
    /// See [`RemoveUser`].
    Remove(RemoveUser),
    /// See [`ChangeProfile`].
    ChangeProfile(ChangeProfile),
    /// See [`ChangeMachine`].
    ChangeMachine(ChangeMachine),
    /// See [`ChangeEmail`].
    ChangeEmail(ChangeEmail),
    /// See [`VerifyEmail`].
    VerifyEmail(VerifyEmail),
    /// See [`CreateEmailVerificationCode`].
    CreateEmailVerificationCode(CreateEmailVerificationCode),
    /// See [`ChangePhone`].
    ChangePhone(ChangePhone),
    /// See [`VerifyPhone`].
    VerifyPhone(VerifyPhone),
    /// See [`CreatePhoneVerificationCode`].
    CreatePhoneVerificationCode(CreatePhoneVerificationCode),
    /// See [`RemovePhone`].
    RemovePhone(RemovePhone),
    /// See [`ChangeAddress`].
    ChangeAddress(ChangeAddress),
    /// See [`SetPassword`].
    SetPassword(SetPassword),
    /// See [`SetOneTimePassword`].
    SetOneTimePassword(SetOneTimePassword),
    /// See [`ChangePassword`].
    ChangePassword(ChangePassword),
    /// See [`CheckPassword`].
    CheckPassword(CheckPassword),
    /// See [`RequestSetPassword`].
    RequestSetPassword(RequestSetPassword),
    /// See [`CreateInitCode`].
    CreateInitCode(CreateInitCode),
    /// See [`VerifyInitCode`].
    VerifyInitCode(VerifyInitCode),
    /// See [`MarkCodeSent`].
    MarkCodeSent(MarkCodeSent),
    /// See [`AddOtp`].
    AddOtp(AddOtp),
    /// See [`CheckOtpSetup`].
    CheckOtpSetup(CheckOtpSetup),
    /// See [`CheckOtp`].
    CheckOtp(CheckOtp),
    /// See [`RemoveOtp`].
    RemoveOtp(RemoveOtp),
    /// See [`SkipMfaInit`].
    SkipMfaInit(SkipMfaInit),
}

impl Command for UserCommand {
    fn command_type(&self) -> &'static str {
        match self {
            Self::AddHuman(c) => c.command_type(),
            Self::RegisterHuman(c) => c.command_type(),
            Self::AddMachine(c) => c.command_type(),
            Self::ChangeUsername(c) => c.command_type(),
            Self::Deactivate(c) => c.command_type(),
            Self::Reactivate(c) => c.command_type(),
            Self::Lock(c) => c.command_type(),
            Self::Unlock(c) => c.command_type(),
            Self::Remove(c) => c.command_type(),
            Self::ChangeProfile(c) => c.command_type(),
            Self::ChangeMachine(c) => c.command_type(),
            Self::ChangeEmail(c) => c.command_type(),
            Self::VerifyEmail(c) => c.command_type(),
            Self::CreateEmailVerificationCode(c) => c.command_type(),
            Self::ChangePhone(c) => c.command_type(),
            Self::VerifyPhone(c) => c.command_type(),
            Self::CreatePhoneVerificationCode(c) => c.command_type(),
            Self::RemovePhone(c) => c.command_type(),
            Self::ChangeAddress(c) => c.command_type(),
            Self::SetPassword(c) => c.command_type(),
            Self::SetOneTimePassword(c) => c.command_type(),
            Self::ChangePassword(c) => c.command_type(),
            Self::CheckPassword(c) => c.command_type(),
            Self::RequestSetPassword(c) => c.command_type(),
            Self::CreateInitCode(c) => c.command_type(),
            Self::VerifyInitCode(c) => c.command_type(),
            Self::MarkCodeSent(c) => c.command_type(),
            Self::AddOtp(c) => c.command_type(),
            Self::CheckOtpSetup(c) => c.command_type(),
            Self::CheckOtp(c) => c.command_type(),
            Self::RemoveOtp(c) => c.command_type(),
            Self::SkipMfaInit(c) => c.command_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_commands_do_not_leak_secrets_in_debug() {
        let command = ChangePassword {
            user_id: "u1".into(),
            old_password: "Old-Secr3t".into(),
            new_password: "New-Secr3t".into(),
        };

        let rendered = format!("{command:?}");

        assert!(rendered.contains("u1"));
        assert!(!rendered.contains("Secr3t"));
    }

    #[test]
    fn test_user_command_delegates_command_type() {
        let command = UserCommand::Lock(LockUser {
            user_id: "u1".into(),
        });

        assert_eq!(command.command_type(), "user.lock");
    }
}
