//! Aggregate root for the user identity context.
//!
//! [`User`] is a snapshot folded from the `user` stream. Its methods are
//! pure decisions: they validate a command against the snapshot and return
//! the events to append, leaving persistence to the command handlers.

use chrono::{DateTime, Duration, Utc};
use keyward_core::aggregate::AggregateRoot;
use keyward_core::crypto::CryptoValue;
use keyward_core::error::DomainError;
use keyward_core::event::Event;
use serde::{Deserialize, Serialize};

use super::events::{
    EmailChanged, HumanAdded, IssuedCode, MachineAdded, MachineChanged, PhoneChanged,
    UserEventKind, UsernameChanged,
};
use super::policy::{check_email_length, check_user_name_length};

/// Lifecycle state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    /// No events yet.
    #[default]
    Unspecified,
    /// Created, waiting for initialization or email verification.
    Initial,
    /// Usable.
    Active,
    /// Deactivated by an administrator.
    Inactive,
    /// Locked, e.g. after too many failed checks.
    Locked,
    /// Removed. Terminal.
    Deleted,
}

/// Gender as recorded in the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Not given.
    #[default]
    Unspecified,
    /// Female.
    Female,
    /// Male.
    Male,
    /// Diverse.
    Diverse,
}

/// Personal data of a human user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Nickname.
    pub nick_name: String,
    /// Name shown in user interfaces.
    pub display_name: String,
    /// BCP 47 language tag.
    pub preferred_language: String,
    /// Gender.
    pub gender: Gender,
}

impl Profile {
    /// Trims fields, checks that first and last name are present and
    /// defaults the display name to `"first last"`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if a name is missing.
    pub fn normalized(mut self) -> Result<Self, DomainError> {
        self.first_name = self.first_name.trim().to_owned();
        self.last_name = self.last_name.trim().to_owned();
        self.nick_name = self.nick_name.trim().to_owned();
        self.display_name = self.display_name.trim().to_owned();
        self.preferred_language = self.preferred_language.trim().to_owned();
        if self.first_name.is_empty() || self.last_name.is_empty() {
            return Err(DomainError::PreconditionFailed(
                "profile requires first and last name".into(),
            ));
        }
        if self.display_name.is_empty() {
            self.display_name = format!("{} {}", self.first_name, self.last_name);
        }
        Ok(self)
    }
}

/// Postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    /// Country.
    pub country: String,
    /// City or town.
    pub locality: String,
    /// Postal code.
    pub postal_code: String,
    /// State or region.
    pub region: String,
    /// Street and number.
    pub street_address: String,
}

/// Email address and its verification status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    /// Address.
    pub address: String,
    /// Whether ownership was proven.
    pub verified: bool,
}

/// Phone number and its verification status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phone {
    /// Number.
    pub number: String,
    /// Whether ownership was proven.
    pub verified: bool,
}

/// Stored password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Password {
    /// Hash.
    pub secret: CryptoValue,
    /// Must be replaced at next login.
    pub change_required: bool,
}

/// An issued, not yet consumed verification code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCode {
    /// Encrypted code.
    pub code: CryptoValue,
    /// Lifetime.
    pub expiry: Duration,
    /// Issue time.
    pub created_at: DateTime<Utc>,
}

impl PendingCode {
    fn from_issued(issued: &IssuedCode, created_at: DateTime<Utc>) -> Self {
        Self {
            code: issued.code.clone(),
            expiry: Duration::seconds(issued.expiry_secs),
            created_at,
        }
    }
}

/// TOTP enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Otp {
    /// Encrypted secret.
    pub secret: CryptoValue,
    /// Setup was confirmed with a valid code.
    pub ready: bool,
}

/// Human-specific part of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Human {
    /// Personal data.
    pub profile: Profile,
    /// Email.
    pub email: Email,
    /// Phone, if any.
    pub phone: Option<Phone>,
    /// Postal address, if any.
    pub address: Option<Address>,
    /// Password, if set.
    pub password: Option<Password>,
    /// Pending initialization code.
    pub init_code: Option<PendingCode>,
    /// Pending email verification code.
    pub email_code: Option<PendingCode>,
    /// Pending phone verification code.
    pub phone_code: Option<PendingCode>,
    /// Pending password reset code.
    pub password_code: Option<PendingCode>,
    /// TOTP enrollment, if any.
    pub otp: Option<Otp>,
    /// When MFA enrollment was last skipped.
    pub mfa_init_skipped: Option<DateTime<Utc>>,
}

impl Human {
    fn from_added(added: &HumanAdded) -> Self {
        Self {
            profile: added.profile.clone(),
            email: Email {
                address: added.email.clone(),
                verified: false,
            },
            phone: added.phone.as_ref().map(|number| Phone {
                number: number.clone(),
                verified: false,
            }),
            address: added.address.clone(),
            password: added.password.as_ref().map(|p| Password {
                secret: p.secret.clone(),
                change_required: p.change_required,
            }),
            init_code: None,
            email_code: None,
            phone_code: None,
            password_code: None,
            otp: None,
            mfa_init_skipped: None,
        }
    }
}

/// Machine-specific part of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Machine {
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
}

/// The aggregate root for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Aggregate identifier.
    pub id: String,
    /// Owning organization.
    pub resource_owner: String,
    /// Sequence of the last applied event.
    pub sequence: i64,
    /// Time of the first event.
    pub creation_date: Option<DateTime<Utc>>,
    /// Time of the last event.
    pub change_date: Option<DateTime<Utc>>,
    /// Login name.
    pub user_name: String,
    /// Lifecycle state.
    pub state: UserState,
    /// Set for human users.
    pub human: Option<Human>,
    /// Set for machine users.
    pub machine: Option<Machine>,
}

/// Returns `true` if `address` looks like `local@domain`.
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    match address.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !address.contains(' ')
        }
        None => false,
    }
}

impl User {
    /// Fails unless the user exists and was not removed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` otherwise.
    pub fn ensure_exists(&self) -> Result<(), DomainError> {
        match self.state {
            UserState::Unspecified | UserState::Deleted => {
                Err(DomainError::AggregateNotFound(format!("user {}", self.id)))
            }
            _ => Ok(()),
        }
    }

    /// The human part of the user.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` for machine users.
    pub fn human(&self) -> Result<&Human, DomainError> {
        self.human
            .as_ref()
            .ok_or_else(|| DomainError::PreconditionFailed(format!("user {} is not a human", self.id)))
    }

    /// The machine part of the user.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` for human users.
    pub fn machine(&self) -> Result<&Machine, DomainError> {
        self.machine.as_ref().ok_or_else(|| {
            DomainError::PreconditionFailed(format!("user {} is not a machine", self.id))
        })
    }

    /// Fails for users that may not log in right now.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` for locked or inactive users.
    pub fn ensure_can_authenticate(&self) -> Result<(), DomainError> {
        match self.state {
            UserState::Locked => Err(DomainError::PreconditionFailed("user is locked".into())),
            UserState::Inactive => Err(DomainError::PreconditionFailed("user is inactive".into())),
            _ => Ok(()),
        }
    }

    /// Decides a deactivation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if already inactive.
    pub fn deactivate(&self) -> Result<UserEventKind, DomainError> {
        if self.state == UserState::Inactive {
            return Err(DomainError::PreconditionFailed("user is already inactive".into()));
        }
        Ok(UserEventKind::UserDeactivated)
    }

    /// Decides a reactivation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` unless inactive.
    pub fn reactivate(&self) -> Result<UserEventKind, DomainError> {
        if self.state != UserState::Inactive {
            return Err(DomainError::PreconditionFailed("user is not inactive".into()));
        }
        Ok(UserEventKind::UserReactivated)
    }

    /// Decides a lock.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` unless active or initial.
    pub fn lock(&self) -> Result<UserEventKind, DomainError> {
        if !matches!(self.state, UserState::Active | UserState::Initial) {
            return Err(DomainError::PreconditionFailed(
                "user must be active or initial to be locked".into(),
            ));
        }
        Ok(UserEventKind::UserLocked)
    }

    /// Decides an unlock.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` unless locked.
    pub fn unlock(&self) -> Result<UserEventKind, DomainError> {
        if self.state != UserState::Locked {
            return Err(DomainError::PreconditionFailed("user is not locked".into()));
        }
        Ok(UserEventKind::UserUnlocked)
    }

    /// Decides a username change.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` for an empty or unchanged name
    /// and `DomainError::InvalidArgument` for an overlong one.
    pub fn change_username(&self, user_name: &str) -> Result<UserEventKind, DomainError> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(DomainError::PreconditionFailed("username must not be empty".into()));
        }
        check_user_name_length(user_name)?;
        if user_name == self.user_name {
            return Err(DomainError::PreconditionFailed("username not changed".into()));
        }
        Ok(UserEventKind::UsernameChanged(UsernameChanged {
            user_name: user_name.to_owned(),
        }))
    }

    /// Decides a profile change.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` for an invalid or unchanged
    /// profile, or for machine users.
    pub fn change_profile(&self, profile: Profile) -> Result<UserEventKind, DomainError> {
        let human = self.human()?;
        let profile = profile.normalized()?;
        if profile == human.profile {
            return Err(DomainError::PreconditionFailed("profile not changed".into()));
        }
        Ok(UserEventKind::ProfileChanged(profile))
    }

    /// Decides a machine change.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` for an empty name, no
    /// changes, or human users.
    pub fn change_machine(&self, name: &str, description: &str) -> Result<UserEventKind, DomainError> {
        let machine = self.machine()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::PreconditionFailed("machine name must not be empty".into()));
        }
        if machine.name == name && machine.description == description {
            return Err(DomainError::PreconditionFailed("machine not changed".into()));
        }
        Ok(UserEventKind::MachineChanged(MachineChanged {
            name: name.to_owned(),
            description: description.to_owned(),
        }))
    }

    /// Decides an email change.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` for a malformed or unchanged
    /// address, or for machine users.
    pub fn change_email(&self, address: &str) -> Result<UserEventKind, DomainError> {
        let human = self.human()?;
        let address = address.trim();
        check_email_length(address)?;
        if !is_valid_email(address) {
            return Err(DomainError::PreconditionFailed(format!("email {address} is invalid")));
        }
        if human.email.address == address {
            return Err(DomainError::PreconditionFailed("email not changed".into()));
        }
        Ok(UserEventKind::EmailChanged(EmailChanged {
            address: address.to_owned(),
        }))
    }

    /// Fails unless a new email code may be issued.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if the email is verified.
    pub fn ensure_email_unverified(&self) -> Result<(), DomainError> {
        if self.human()?.email.verified {
            return Err(DomainError::PreconditionFailed("email is already verified".into()));
        }
        Ok(())
    }

    /// Decides a phone change.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` for an empty or unchanged
    /// number, or for machine users.
    pub fn change_phone(&self, number: &str) -> Result<UserEventKind, DomainError> {
        let human = self.human()?;
        let number = number.trim();
        if number.is_empty() {
            return Err(DomainError::PreconditionFailed("phone must not be empty".into()));
        }
        if human.phone.as_ref().is_some_and(|p| p.number == number) {
            return Err(DomainError::PreconditionFailed("phone not changed".into()));
        }
        Ok(UserEventKind::PhoneChanged(PhoneChanged {
            number: number.to_owned(),
        }))
    }

    /// Decides a phone removal.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if there is no phone.
    pub fn remove_phone(&self) -> Result<UserEventKind, DomainError> {
        if self.human()?.phone.is_none() {
            return Err(DomainError::NotFound(format!("phone of user {}", self.id)));
        }
        Ok(UserEventKind::PhoneRemoved)
    }

    /// Fails unless a new phone code may be issued.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if there is no phone or it
    /// is verified.
    pub fn ensure_phone_unverified(&self) -> Result<(), DomainError> {
        match &self.human()?.phone {
            None => Err(DomainError::PreconditionFailed("user has no phone".into())),
            Some(phone) if phone.verified => {
                Err(DomainError::PreconditionFailed("phone is already verified".into()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Decides an address change.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if unchanged.
    pub fn change_address(&self, address: Address) -> Result<UserEventKind, DomainError> {
        if self.human()?.address.as_ref() == Some(&address) {
            return Err(DomainError::PreconditionFailed("address not changed".into()));
        }
        Ok(UserEventKind::AddressChanged(address))
    }

    /// The stored password.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if none is set.
    pub fn password(&self) -> Result<&Password, DomainError> {
        self.human()?
            .password
            .as_ref()
            .ok_or_else(|| DomainError::PreconditionFailed("user has no password".into()))
    }

    /// Fails unless a new OTP may be generated.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AlreadyExists` if an OTP is ready.
    pub fn ensure_otp_addable(&self) -> Result<(), DomainError> {
        if self.human()?.otp.as_ref().is_some_and(|otp| otp.ready) {
            return Err(DomainError::AlreadyExists("otp is already set up".into()));
        }
        Ok(())
    }

    /// The OTP awaiting setup confirmation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if there is none or it is
    /// already ready.
    pub fn otp_pending_setup(&self) -> Result<&Otp, DomainError> {
        match &self.human()?.otp {
            None => Err(DomainError::PreconditionFailed("otp does not exist".into())),
            Some(otp) if otp.ready => {
                Err(DomainError::PreconditionFailed("otp is already set up".into()))
            }
            Some(otp) => Ok(otp),
        }
    }

    /// The confirmed OTP.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` unless an OTP is ready.
    pub fn otp_ready(&self) -> Result<&Otp, DomainError> {
        match &self.human()?.otp {
            Some(otp) if otp.ready => Ok(otp),
            _ => Err(DomainError::PreconditionFailed("otp is not ready".into())),
        }
    }

    /// Decides an OTP removal.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if there is no OTP.
    pub fn remove_otp(&self) -> Result<UserEventKind, DomainError> {
        if self.human()?.otp.is_none() {
            return Err(DomainError::PreconditionFailed("otp does not exist".into()));
        }
        Ok(UserEventKind::OtpRemoved)
    }

    /// Account name shown in authenticator apps when none is given: the
    /// email address, or the username.
    #[must_use]
    pub fn otp_account_name(&self) -> String {
        self.human
            .as_ref()
            .map(|h| h.email.address.clone())
            .filter(|address| !address.is_empty())
            .unwrap_or_else(|| self.user_name.clone())
    }

    fn human_mut(&mut self) -> Option<&mut Human> {
        self.human.as_mut()
    }
}

impl AggregateRoot for User {
    type Event = UserEventKind;
    const AGGREGATE_TYPE: &'static str = "user";
    const AGGREGATE_VERSION: &'static str = "v1";

    fn new(aggregate_id: &str) -> Self {
        Self {
            id: aggregate_id.to_owned(),
            resource_owner: String::new(),
            sequence: 0,
            creation_date: None,
            change_date: None,
            user_name: String::new(),
            state: UserState::Unspecified,
            human: None,
            machine: None,
        }
    }

    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn sequence(&self) -> i64 {
        self.sequence
    }

    fn resource_owner(&self) -> &str {
        &self.resource_owner
    }

    #[allow(clippy::too_many_lines)]
    fn apply(&mut self, event: &Event<UserEventKind>) {
        let at = event.metadata.created_at;
        match &event.kind {
            UserEventKind::HumanAdded(added) | UserEventKind::HumanRegistered(added) => {
                self.user_name.clone_from(&added.user_name);
                self.human = Some(Human::from_added(added));
                self.state = UserState::Initial;
                self.creation_date = Some(at);
            }
            UserEventKind::MachineAdded(MachineAdded {
                user_name,
                name,
                description,
            }) => {
                self.user_name.clone_from(user_name);
                self.machine = Some(Machine {
                    name: name.clone(),
                    description: description.clone(),
                });
                self.state = UserState::Active;
                self.creation_date = Some(at);
            }
            UserEventKind::MachineChanged(changed) => {
                if let Some(machine) = self.machine.as_mut() {
                    machine.name.clone_from(&changed.name);
                    machine.description.clone_from(&changed.description);
                }
            }
            UserEventKind::UsernameChanged(changed) => {
                self.user_name.clone_from(&changed.user_name);
            }
            UserEventKind::UserDeactivated => self.state = UserState::Inactive,
            UserEventKind::UserReactivated | UserEventKind::UserUnlocked => {
                self.state = UserState::Active;
            }
            UserEventKind::UserLocked => self.state = UserState::Locked,
            UserEventKind::UserRemoved => self.state = UserState::Deleted,
            UserEventKind::ProfileChanged(profile) => {
                if let Some(human) = self.human_mut() {
                    human.profile = profile.clone();
                }
            }
            UserEventKind::EmailChanged(changed) => {
                if let Some(human) = self.human_mut() {
                    human.email = Email {
                        address: changed.address.clone(),
                        verified: false,
                    };
                    human.email_code = None;
                }
            }
            UserEventKind::EmailVerified => {
                if let Some(human) = self.human_mut() {
                    human.email.verified = true;
                    human.email_code = None;
                }
                if self.state == UserState::Initial {
                    self.state = UserState::Active;
                }
            }
            UserEventKind::EmailCodeAdded(issued) => {
                if let Some(human) = self.human_mut() {
                    human.email_code = Some(PendingCode::from_issued(issued, at));
                }
            }
            UserEventKind::PhoneChanged(changed) => {
                if let Some(human) = self.human_mut() {
                    human.phone = Some(Phone {
                        number: changed.number.clone(),
                        verified: false,
                    });
                    human.phone_code = None;
                }
            }
            UserEventKind::PhoneRemoved => {
                if let Some(human) = self.human_mut() {
                    human.phone = None;
                    human.phone_code = None;
                }
            }
            UserEventKind::PhoneVerified => {
                if let Some(human) = self.human_mut() {
                    if let Some(phone) = human.phone.as_mut() {
                        phone.verified = true;
                    }
                    human.phone_code = None;
                }
            }
            UserEventKind::PhoneCodeAdded(issued) => {
                if let Some(human) = self.human_mut() {
                    human.phone_code = Some(PendingCode::from_issued(issued, at));
                }
            }
            UserEventKind::AddressChanged(address) => {
                if let Some(human) = self.human_mut() {
                    human.address = Some(address.clone());
                }
            }
            UserEventKind::PasswordChanged(password) => {
                if let Some(human) = self.human_mut() {
                    human.password = Some(Password {
                        secret: password.secret.clone(),
                        change_required: password.change_required,
                    });
                    human.password_code = None;
                }
            }
            UserEventKind::PasswordCodeAdded(issued) => {
                if let Some(human) = self.human_mut() {
                    human.password_code = Some(PendingCode::from_issued(issued, at));
                }
            }
            UserEventKind::InitCodeAdded(issued) => {
                if let Some(human) = self.human_mut() {
                    human.init_code = Some(PendingCode::from_issued(issued, at));
                }
            }
            UserEventKind::InitCodeVerified => {
                if let Some(human) = self.human_mut() {
                    human.init_code = None;
                }
                if self.state == UserState::Initial {
                    self.state = UserState::Active;
                }
            }
            UserEventKind::OtpAdded(added) => {
                if let Some(human) = self.human_mut() {
                    human.otp = Some(Otp {
                        secret: added.secret.clone(),
                        ready: false,
                    });
                }
            }
            UserEventKind::OtpVerified => {
                if let Some(otp) = self.human_mut().and_then(|h| h.otp.as_mut()) {
                    otp.ready = true;
                }
            }
            UserEventKind::OtpRemoved => {
                if let Some(human) = self.human_mut() {
                    human.otp = None;
                }
            }
            UserEventKind::MfaInitSkipped => {
                if let Some(human) = self.human_mut() {
                    human.mfa_init_skipped = Some(at);
                }
            }
            UserEventKind::EmailVerificationFailed
            | UserEventKind::EmailCodeSent
            | UserEventKind::PhoneVerificationFailed
            | UserEventKind::PhoneCodeSent
            | UserEventKind::PasswordCodeSent
            | UserEventKind::PasswordCheckSucceeded
            | UserEventKind::PasswordCheckFailed
            | UserEventKind::InitCodeSent
            | UserEventKind::InitCodeCheckFailed
            | UserEventKind::OtpCheckSucceeded
            | UserEventKind::OtpCheckFailed => {}
        }

        if self.resource_owner.is_empty() {
            self.resource_owner.clone_from(&event.metadata.resource_owner);
        }
        self.sequence = event.metadata.sequence;
        self.change_date = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use keyward_core::aggregate::fold;
    use keyward_core::event::{EventKind, StoredEvent};
    use uuid::Uuid;

    use crate::domain::events::{HashedPassword, OtpAdded};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn stored(sequence: i64, kind: &UserEventKind) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_type: "user".into(),
            aggregate_id: "u1".into(),
            aggregate_version: "v1".into(),
            sequence,
            event_type: kind.event_type().into(),
            payload: kind.to_payload().unwrap(),
            editor_id: "admin".into(),
            resource_owner: "org-1".into(),
            correlation_id: Uuid::new_v4(),
            created_at: fixed_now(),
        }
    }

    fn human_added() -> UserEventKind {
        UserEventKind::HumanAdded(HumanAdded {
            user_name: "alice".into(),
            profile: Profile {
                first_name: "Alice".into(),
                last_name: "Liddell".into(),
                display_name: "Alice Liddell".into(),
                ..Profile::default()
            },
            email: "alice@example.com".into(),
            phone: None,
            address: None,
            password: Some(HashedPassword {
                secret: CryptoValue {
                    algorithm: "plain".into(),
                    key_id: String::new(),
                    crypted: b"pw".to_vec(),
                },
                change_required: false,
            }),
        })
    }

    fn user_from(kinds: &[UserEventKind]) -> User {
        let events: Vec<StoredEvent> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| stored(i64::try_from(i + 1).unwrap(), kind))
            .collect();
        let mut user = User::new("u1");
        fold(&mut user, &events).unwrap();
        user
    }

    #[test]
    fn test_human_added_starts_initial_with_sequence_one() {
        let user = user_from(&[human_added()]);

        assert_eq!(user.state, UserState::Initial);
        assert_eq!(user.sequence, 1);
        assert_eq!(user.resource_owner, "org-1");
        assert_eq!(user.user_name, "alice");
        assert!(!user.human().unwrap().email.verified);
    }

    #[test]
    fn test_email_verified_activates_initial_user() {
        let user = user_from(&[human_added(), UserEventKind::EmailVerified]);

        assert_eq!(user.state, UserState::Active);
        assert!(user.human().unwrap().email.verified);
    }

    #[test]
    fn test_state_machine_transitions() {
        let active = user_from(&[human_added(), UserEventKind::EmailVerified]);
        let inactive = user_from(&[
            human_added(),
            UserEventKind::EmailVerified,
            UserEventKind::UserDeactivated,
        ]);
        let locked = user_from(&[human_added(), UserEventKind::UserLocked]);

        assert!(active.reactivate().is_err());
        assert!(active.unlock().is_err());
        assert!(active.deactivate().is_ok());
        assert!(inactive.deactivate().is_err());
        assert_eq!(inactive.reactivate().unwrap(), UserEventKind::UserReactivated);
        assert!(inactive.lock().is_err());
        assert_eq!(locked.unlock().unwrap(), UserEventKind::UserUnlocked);
        assert!(locked.ensure_can_authenticate().is_err());
    }

    #[test]
    fn test_removed_user_does_not_exist() {
        let user = user_from(&[human_added(), UserEventKind::UserRemoved]);

        match user.ensure_exists() {
            Err(DomainError::AggregateNotFound(msg)) => assert_eq!(msg, "user u1"),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_unchanged_profile_is_rejected() {
        let user = user_from(&[human_added()]);
        let same = user.human().unwrap().profile.clone();

        match user.change_profile(same) {
            Err(DomainError::PreconditionFailed(msg)) => assert_eq!(msg, "profile not changed"),
            other => panic!("expected PreconditionFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_profile_display_name_defaults_to_full_name() {
        let profile = Profile {
            first_name: " Bob ".into(),
            last_name: "Builder".into(),
            ..Profile::default()
        }
        .normalized()
        .unwrap();

        assert_eq!(profile.display_name, "Bob Builder");
    }

    #[test]
    fn test_otp_lifecycle_guards() {
        let secret = CryptoValue {
            algorithm: "plain".into(),
            key_id: String::new(),
            crypted: b"s".to_vec(),
        };
        let added = user_from(&[
            human_added(),
            UserEventKind::OtpAdded(OtpAdded { secret }),
        ]);
        let ready = {
            let mut user = added.clone();
            fold(&mut user, &[stored(3, &UserEventKind::OtpVerified)]).unwrap();
            user
        };

        assert!(added.otp_pending_setup().is_ok());
        assert!(added.otp_ready().is_err());
        assert!(added.ensure_otp_addable().is_ok());
        assert!(ready.otp_pending_setup().is_err());
        assert!(ready.otp_ready().is_ok());
        match ready.ensure_otp_addable() {
            Err(DomainError::AlreadyExists(_)) => {}
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        assert!(user_from(&[human_added()]).remove_otp().is_err());
    }

    #[test]
    fn test_otp_account_name_prefers_email() {
        let user = user_from(&[human_added()]);

        assert_eq!(user.otp_account_name(), "alice@example.com");
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("plain"));
    }

    #[test]
    fn test_machine_user_is_active_and_not_human() {
        let user = user_from(&[UserEventKind::MachineAdded(MachineAdded {
            user_name: "ci-bot".into(),
            name: "CI".into(),
            description: "build robot".into(),
        })]);

        assert_eq!(user.state, UserState::Active);
        assert!(user.human().is_err());
        assert_eq!(user.otp_account_name(), "ci-bot");
        assert!(user.change_machine("CI", "build robot").is_err());
        assert!(user.change_machine("CI", "deploy robot").is_ok());
    }
}
