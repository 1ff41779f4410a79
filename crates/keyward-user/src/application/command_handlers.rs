//! Command handlers for the user identity context.
//!
//! Every handler follows the same shape: load the snapshot through the
//! cache, decide against it, build the pending aggregates (the user stream
//! plus any reservation streams), append them in one call and refresh the
//! cache with the committed events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyward_core::aggregate::{AggregateBuilder, AggregateRoot, PendingAggregate, fold};
use keyward_core::cache::load_through;
use keyward_core::command::{CommandContext, ObjectDetails};
use keyward_core::crypto::{CodeGenerator, CryptoValue, GeneratedCode, OtpKey, PasswordHasher};
use keyward_core::error::DomainError;
use keyward_core::event::{EventKind, StoredEvent};
use tracing::{debug, instrument, warn};

use crate::application::services::UserServices;
use crate::domain::aggregates::{PendingCode, User, is_valid_email};
use crate::domain::commands::{
    AddHuman, AddMachine, AddOtp, ChangeAddress, ChangeEmail, ChangeMachine, ChangePassword,
    ChangePhone, ChangeProfile, ChangeUsername, CheckOtp, CheckOtpSetup, CheckPassword, CodeKind,
    CreateEmailVerificationCode, CreateInitCode, CreatePhoneVerificationCode, DeactivateUser,
    LockUser, MarkCodeSent, NewHuman, ReactivateUser, RegisterHuman, RemoveOtp, RemovePhone,
    RemoveUser, RequestSetPassword, SetOneTimePassword, SetPassword, SkipMfaInit, UnlockUser,
    UserCommand, VerifyEmail, VerifyInitCode, VerifyPhone,
};
use crate::domain::events::{
    HashedPassword, HumanAdded, IssuedCode, MachineAdded, OtpAdded, UserEventKind,
};
use crate::domain::policy::{EMAILS, USERNAMES, check_email_length, check_user_name_length};

/// A plaintext code issued by a command, for the notification channel.
#[derive(Clone, PartialEq, Eq)]
pub struct PlainCode {
    /// Which code was issued.
    pub kind: CodeKind,
    /// The plaintext.
    pub value: String,
}

impl std::fmt::Debug for PlainCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainCode")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct UserCommandResult {
    /// The user affected by the command.
    pub aggregate_id: String,
    /// Sequence, owner and time of the last event on the user stream.
    pub details: ObjectDetails,
    /// Every stored event, reservation streams included.
    pub stored_events: Vec<StoredEvent>,
    /// Codes issued by the command.
    pub codes: Vec<PlainCode>,
    /// TOTP key generated by [`AddOtp`].
    pub otp: Option<OtpKey>,
}

impl UserCommandResult {
    /// The plaintext of the issued code of `kind`, if any.
    #[must_use]
    pub fn code(&self, kind: CodeKind) -> Option<&str> {
        self.codes
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.value.as_str())
    }

    fn with_code(mut self, kind: CodeKind, generated: GeneratedCode) -> Self {
        self.codes.push(PlainCode {
            kind,
            value: generated.plain,
        });
        self
    }
}

fn issued(generated: &GeneratedCode) -> IssuedCode {
    IssuedCode {
        code: generated.value.clone(),
        expiry_secs: generated.expiry.num_seconds(),
    }
}

/// Loads a live user through the cache.
async fn load_user(user_id: &str, services: &UserServices) -> Result<User, DomainError> {
    if user_id.trim().is_empty() {
        return Err(DomainError::PreconditionFailed("user id is missing".into()));
    }
    let user = load_through(user_id, services.log.as_ref(), &services.cache).await?;
    user.ensure_exists()?;
    Ok(user)
}

fn user_stream(
    builder: AggregateBuilder,
    events: &[UserEventKind],
    at: DateTime<Utc>,
) -> Result<PendingAggregate, DomainError> {
    events
        .iter()
        .try_fold(builder, |builder, kind| builder.push(kind, at))
        .map(AggregateBuilder::build)
}

/// Appends `pending` and folds the committed user events onto `snapshot`
/// before caching it.
async fn commit(
    mut snapshot: User,
    pending: Vec<PendingAggregate>,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let stored_events = services.log.append(pending).await?;
    let own: Vec<StoredEvent> = stored_events
        .iter()
        .filter(|e| e.aggregate_type == User::AGGREGATE_TYPE && e.aggregate_id == snapshot.id)
        .cloned()
        .collect();
    fold(&mut snapshot, &own)?;

    let details = ObjectDetails::from_events(&stored_events, User::AGGREGATE_TYPE, &snapshot.id)
        .ok_or_else(|| {
            DomainError::Infrastructure(format!("no events committed for user {}", snapshot.id))
        })?;
    debug!(
        user_id = %snapshot.id,
        sequence = details.sequence,
        events = stored_events.len(),
        "Committed user events"
    );
    let aggregate_id = snapshot.id.clone();
    services.cache.put(snapshot);
    Ok(UserCommandResult {
        aggregate_id,
        details,
        stored_events,
        codes: Vec::new(),
        otp: None,
    })
}

/// Appends events to the user stream only.
async fn commit_events(
    user: User,
    events: &[UserEventKind],
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let pending = user_stream(
        AggregateBuilder::for_snapshot(&user, ctx),
        events,
        services.clock.now(),
    )?;
    commit(user, vec![pending], services).await
}

/// Records a failed check and hands back the check's error. Errors other
/// than a wrong or expired value are returned without recording anything.
async fn record_failure(
    user: User,
    failed: UserEventKind,
    error: DomainError,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    if !matches!(error, DomainError::InvalidArgument(_)) {
        return Err(error);
    }
    warn!(user_id = %user.id, event_type = failed.event_type(), "Check failed");
    commit_events(user, &[failed], ctx, services).await?;
    Err(error)
}

fn verify_pending(
    generator: &dyn CodeGenerator,
    pending: &PendingCode,
    supplied: &str,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    generator.verify(pending.created_at, pending.expiry, &pending.code, supplied, now)
}

fn require_code(code: &str) -> Result<&str, DomainError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(DomainError::PreconditionFailed("code is empty".into()));
    }
    Ok(code)
}

/// Runs a password hasher call on the blocking pool.
async fn on_hasher<T, F>(services: &UserServices, call: F) -> Result<T, DomainError>
where
    T: Send + 'static,
    F: FnOnce(&dyn PasswordHasher) -> Result<T, DomainError> + Send + 'static,
{
    let hasher = Arc::clone(&services.passwords);
    tokio::task::spawn_blocking(move || call(hasher.as_ref()))
        .await
        .map_err(|e| DomainError::Infrastructure(format!("password hashing task failed: {e}")))?
}

async fn hash_password(
    plain: &str,
    change_required: bool,
    services: &UserServices,
) -> Result<HashedPassword, DomainError> {
    services.password_policy.check(plain)?;
    let plain = plain.to_owned();
    let secret = on_hasher(services, move |hasher| hasher.hash(&plain)).await?;
    Ok(HashedPassword {
        secret,
        change_required,
    })
}

async fn verify_password(
    hashed: &CryptoValue,
    plain: &str,
    services: &UserServices,
) -> Result<(), DomainError> {
    let hashed = hashed.clone();
    let plain = plain.to_owned();
    on_hasher(services, move |hasher| hasher.verify(&hashed, &plain)).await
}

fn same_value(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

async fn create_human(
    human: &NewHuman,
    registered: bool,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user_name = human.user_name.trim();
    if user_name.is_empty() {
        return Err(DomainError::PreconditionFailed("username must not be empty".into()));
    }
    check_user_name_length(user_name)?;
    let profile = human.profile.clone().normalized()?;
    let email = human.email.address.trim();
    check_email_length(email)?;
    if !is_valid_email(email) {
        return Err(DomainError::PreconditionFailed(format!("email {email} is invalid")));
    }
    let password = match human.password.as_deref() {
        Some(plain) => Some(hash_password(plain, human.password_change_required, services).await?),
        None if registered => {
            return Err(DomainError::InvalidArgument(
                "self-registration requires a password".into(),
            ));
        }
        None => None,
    };
    let phone = human
        .phone
        .as_ref()
        .filter(|p| !p.number.trim().is_empty());

    let user_id = services.ids.next_id();
    let now = services.clock.now();
    let added = HumanAdded {
        user_name: user_name.to_owned(),
        profile,
        email: email.to_owned(),
        phone: phone.map(|p| p.number.trim().to_owned()),
        address: human.address.clone(),
        password,
    };
    let needs_init_code = added.password.is_none();
    let mut events = vec![if registered {
        UserEventKind::HumanRegistered(added)
    } else {
        UserEventKind::HumanAdded(added)
    }];
    if human.email.verified {
        events.push(UserEventKind::EmailVerified);
    }
    let mut phone_code = None;
    if let Some(phone) = phone {
        if phone.verified {
            events.push(UserEventKind::PhoneVerified);
        } else {
            let generated = services.codes.phone.generate()?;
            events.push(UserEventKind::PhoneCodeAdded(issued(&generated)));
            phone_code = Some(generated);
        }
    }
    let mut init_code = None;
    if needs_init_code {
        let generated = services.codes.init.generate()?;
        events.push(UserEventKind::InitCodeAdded(issued(&generated)));
        init_code = Some(generated);
    }

    let pending = vec![
        user_stream(AggregateBuilder::create::<User>(&user_id, ctx), &events, now)?,
        USERNAMES.reserve(
            user_name,
            services.uniqueness.username_scope(&ctx.resource_owner),
            &user_id,
            ctx,
            now,
        )?,
        EMAILS.reserve(
            email,
            services.uniqueness.email_scope(&ctx.resource_owner),
            &user_id,
            ctx,
            now,
        )?,
    ];
    let mut result = commit(User::new(&user_id), pending, services).await?;
    if let Some(generated) = phone_code {
        result = result.with_code(CodeKind::Phone, generated);
    }
    if let Some(generated) = init_code {
        result = result.with_code(CodeKind::Init, generated);
    }
    Ok(result)
}

/// Handles [`AddHuman`]: creates a human user together with its username
/// and email reservations.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for invalid input,
/// `DomainError::InvalidArgument` for a password violating the policy and
/// `DomainError::AlreadyExists` if the username or email is taken.
#[instrument(skip_all, fields(user_name = %command.human.user_name))]
pub async fn handle_add_human(
    command: &AddHuman,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    create_human(&command.human, false, ctx, services).await
}

/// Handles [`RegisterHuman`]: like [`handle_add_human`] but records a
/// self-registration. Self-registration always sets a password, so no init
/// code is issued.
///
/// # Errors
///
/// Same as [`handle_add_human`], plus `DomainError::InvalidArgument` when
/// no password is supplied.
#[instrument(skip_all, fields(user_name = %command.human.user_name))]
pub async fn handle_register_human(
    command: &RegisterHuman,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    create_human(&command.human, true, ctx, services).await
}

/// Handles [`AddMachine`]: creates an active machine user and reserves its
/// username.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for a missing username or
/// name, `DomainError::AlreadyExists` if the username is taken.
#[instrument(skip_all, fields(user_name = %command.user_name))]
pub async fn handle_add_machine(
    command: &AddMachine,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user_name = command.user_name.trim();
    let name = command.name.trim();
    if user_name.is_empty() || name.is_empty() {
        return Err(DomainError::PreconditionFailed(
            "machine requires username and name".into(),
        ));
    }
    check_user_name_length(user_name)?;
    let user_id = services.ids.next_id();
    let now = services.clock.now();
    let added = UserEventKind::MachineAdded(MachineAdded {
        user_name: user_name.to_owned(),
        name: name.to_owned(),
        description: command.description.clone(),
    });
    let pending = vec![
        user_stream(AggregateBuilder::create::<User>(&user_id, ctx), &[added], now)?,
        USERNAMES.reserve(
            user_name,
            services.uniqueness.username_scope(&ctx.resource_owner),
            &user_id,
            ctx,
            now,
        )?,
    ];
    commit(User::new(&user_id), pending, services).await
}

/// Handles [`ChangeUsername`]: swaps the username reservation unless the
/// new name differs only in case.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for an unchanged name and
/// `DomainError::AlreadyExists` if the new name is taken.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_change_username(
    command: &ChangeUsername,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    let event = user.change_username(&command.user_name)?;
    let now = services.clock.now();
    let new_name = command.user_name.trim();

    let mut pending = vec![user_stream(
        AggregateBuilder::for_snapshot(&user, ctx),
        &[event],
        now,
    )?];
    if !same_value(new_name, &user.user_name) {
        let scope = services.uniqueness.username_scope(&user.resource_owner);
        pending.push(USERNAMES.reserve(new_name, scope, &user.id, ctx, now)?);
        pending.push(USERNAMES.release(&user.user_name, scope, &user.id, ctx, now)?);
    }
    commit(user, pending, services).await
}

async fn transition(
    user_id: &str,
    ctx: &CommandContext,
    services: &UserServices,
    decide: fn(&User) -> Result<UserEventKind, DomainError>,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(user_id, services).await?;
    let event = decide(&user)?;
    commit_events(user, &[event], ctx, services).await
}

/// Handles [`DeactivateUser`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if the user is already inactive.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_deactivate(
    command: &DeactivateUser,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    transition(&command.user_id, ctx, services, User::deactivate).await
}

/// Handles [`ReactivateUser`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` unless the user is inactive.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_reactivate(
    command: &ReactivateUser,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    transition(&command.user_id, ctx, services, User::reactivate).await
}

/// Handles [`LockUser`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` unless the user is active or
/// initial.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_lock(
    command: &LockUser,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    transition(&command.user_id, ctx, services, User::lock).await
}

/// Handles [`UnlockUser`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` unless the user is locked.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_unlock(
    command: &UnlockUser,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    transition(&command.user_id, ctx, services, User::unlock).await
}

/// Handles [`RemoveUser`]: marks the user removed and releases its username
/// and email in the same append.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for unknown or removed users.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_remove_user(
    command: &RemoveUser,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    let now = services.clock.now();
    let mut pending = vec![
        user_stream(
            AggregateBuilder::for_snapshot(&user, ctx),
            &[UserEventKind::UserRemoved],
            now,
        )?,
        USERNAMES.release(
            &user.user_name,
            services.uniqueness.username_scope(&user.resource_owner),
            &user.id,
            ctx,
            now,
        )?,
    ];
    if let Some(human) = &user.human {
        pending.push(EMAILS.release(
            &human.email.address,
            services.uniqueness.email_scope(&user.resource_owner),
            &user.id,
            ctx,
            now,
        )?);
    }
    commit(user, pending, services).await
}

/// Handles [`ChangeProfile`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for an invalid or unchanged
/// profile.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_change_profile(
    command: &ChangeProfile,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    let event = user.change_profile(command.profile.clone())?;
    commit_events(user, &[event], ctx, services).await
}

/// Handles [`ChangeMachine`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for human users or no changes.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_change_machine(
    command: &ChangeMachine,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    let event = user.change_machine(&command.name, &command.description)?;
    commit_events(user, &[event], ctx, services).await
}

/// Handles [`ChangeEmail`]: swaps the email reservation and either marks
/// the address verified or issues an email code.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for a malformed or unchanged
/// address and `DomainError::AlreadyExists` if it is taken.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_change_email(
    command: &ChangeEmail,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    let changed = user.change_email(&command.address)?;
    let old_address = user.human()?.email.address.clone();
    let new_address = command.address.trim();
    let now = services.clock.now();

    let mut events = vec![changed];
    let mut code = None;
    if command.verified {
        events.push(UserEventKind::EmailVerified);
    } else {
        let generated = services.codes.email.generate()?;
        events.push(UserEventKind::EmailCodeAdded(issued(&generated)));
        code = Some(generated);
    }

    let mut pending = vec![user_stream(
        AggregateBuilder::for_snapshot(&user, ctx),
        &events,
        now,
    )?];
    if !same_value(new_address, &old_address) {
        let scope = services.uniqueness.email_scope(&user.resource_owner);
        pending.push(EMAILS.reserve(new_address, scope, &user.id, ctx, now)?);
        pending.push(EMAILS.release(&old_address, scope, &user.id, ctx, now)?);
    }
    let result = commit(user, pending, services).await?;
    Ok(match code {
        Some(generated) => result.with_code(CodeKind::Email, generated),
        None => result,
    })
}

/// Handles [`VerifyEmail`]. A wrong or expired code is recorded before the
/// error is returned.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for an empty code,
/// `DomainError::NotFound` if no code was issued and
/// `DomainError::InvalidArgument` for a wrong or expired code.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_verify_email(
    command: &VerifyEmail,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let supplied = require_code(&command.code)?;
    let user = load_user(&command.user_id, services).await?;
    let pending = user
        .human()?
        .email_code
        .clone()
        .ok_or_else(|| DomainError::NotFound(format!("email code of user {}", user.id)))?;

    match verify_pending(services.codes.email.as_ref(), &pending, supplied, services.clock.now()) {
        Ok(()) => commit_events(user, &[UserEventKind::EmailVerified], ctx, services).await,
        Err(e) => record_failure(user, UserEventKind::EmailVerificationFailed, e, ctx, services).await,
    }
}

/// Handles [`CreateEmailVerificationCode`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if the email is already
/// verified.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_create_email_verification_code(
    command: &CreateEmailVerificationCode,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.ensure_email_unverified()?;
    let generated = services.codes.email.generate()?;
    let event = UserEventKind::EmailCodeAdded(issued(&generated));
    Ok(commit_events(user, &[event], ctx, services)
        .await?
        .with_code(CodeKind::Email, generated))
}

/// Handles [`ChangePhone`]: either marks the number verified or issues a
/// phone code.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for an empty or unchanged
/// number.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_change_phone(
    command: &ChangePhone,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    let mut events = vec![user.change_phone(&command.number)?];
    if command.verified {
        events.push(UserEventKind::PhoneVerified);
        return commit_events(user, &events, ctx, services).await;
    }
    let generated = services.codes.phone.generate()?;
    events.push(UserEventKind::PhoneCodeAdded(issued(&generated)));
    Ok(commit_events(user, &events, ctx, services)
        .await?
        .with_code(CodeKind::Phone, generated))
}

/// Handles [`VerifyPhone`]. A wrong or expired code is recorded before the
/// error is returned.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for an empty code,
/// `DomainError::NotFound` if no code was issued and
/// `DomainError::InvalidArgument` for a wrong or expired code.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_verify_phone(
    command: &VerifyPhone,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let supplied = require_code(&command.code)?;
    let user = load_user(&command.user_id, services).await?;
    let pending = user
        .human()?
        .phone_code
        .clone()
        .ok_or_else(|| DomainError::NotFound(format!("phone code of user {}", user.id)))?;

    match verify_pending(services.codes.phone.as_ref(), &pending, supplied, services.clock.now()) {
        Ok(()) => commit_events(user, &[UserEventKind::PhoneVerified], ctx, services).await,
        Err(e) => record_failure(user, UserEventKind::PhoneVerificationFailed, e, ctx, services).await,
    }
}

/// Handles [`CreatePhoneVerificationCode`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if there is no phone or it is
/// already verified.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_create_phone_verification_code(
    command: &CreatePhoneVerificationCode,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.ensure_phone_unverified()?;
    let generated = services.codes.phone.generate()?;
    let event = UserEventKind::PhoneCodeAdded(issued(&generated));
    Ok(commit_events(user, &[event], ctx, services)
        .await?
        .with_code(CodeKind::Phone, generated))
}

/// Handles [`RemovePhone`].
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user has no phone.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_remove_phone(
    command: &RemovePhone,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    transition(&command.user_id, ctx, services, User::remove_phone).await
}

/// Handles [`ChangeAddress`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if the address is unchanged.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_change_address(
    command: &ChangeAddress,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    let event = user.change_address(command.address.clone())?;
    commit_events(user, &[event], ctx, services).await
}

/// Handles [`SetPassword`]: consumes a password reset code and stores the
/// new password. A wrong code is not recorded.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if no reset code was issued
/// and `DomainError::InvalidArgument` for a wrong or expired code or a
/// password violating the policy.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_set_password(
    command: &SetPassword,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let supplied = require_code(&command.code)?;
    let user = load_user(&command.user_id, services).await?;
    let pending = user.human()?.password_code.clone().ok_or_else(|| {
        DomainError::PreconditionFailed(format!("no password code issued for user {}", user.id))
    })?;
    verify_pending(
        services.codes.password.as_ref(),
        &pending,
        supplied,
        services.clock.now(),
    )?;
    let password = hash_password(&command.password, false, services).await?;
    commit_events(user, &[UserEventKind::PasswordChanged(password)], ctx, services).await
}

/// Handles [`SetOneTimePassword`]: stores a password that must be changed
/// at next login.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` for a password violating the
/// policy.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_set_one_time_password(
    command: &SetOneTimePassword,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.human()?;
    let password = hash_password(&command.password, true, services).await?;
    commit_events(user, &[UserEventKind::PasswordChanged(password)], ctx, services).await
}

/// Handles [`ChangePassword`]: proves the old password, then stores the
/// new one.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if no password is set and
/// `DomainError::InvalidArgument` for a wrong old password or a new
/// password violating the policy.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_change_password(
    command: &ChangePassword,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    verify_password(&user.password()?.secret, &command.old_password, services).await?;
    let password = hash_password(&command.new_password, false, services).await?;
    commit_events(user, &[UserEventKind::PasswordChanged(password)], ctx, services).await
}

/// Handles [`CheckPassword`]. Both outcomes are recorded.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for locked or inactive users
/// or users without password, and `DomainError::InvalidArgument` for a
/// wrong password.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_check_password(
    command: &CheckPassword,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.ensure_can_authenticate()?;
    let checked = verify_password(&user.password()?.secret, &command.password, services).await;
    match checked {
        Ok(()) => {
            commit_events(user, &[UserEventKind::PasswordCheckSucceeded], ctx, services).await
        }
        Err(e) => record_failure(user, UserEventKind::PasswordCheckFailed, e, ctx, services).await,
    }
}

/// Handles [`RequestSetPassword`]: issues a password reset code.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for machine users.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_request_set_password(
    command: &RequestSetPassword,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.human()?;
    let generated = services.codes.password.generate()?;
    let event = UserEventKind::PasswordCodeAdded(issued(&generated));
    Ok(commit_events(user, &[event], ctx, services)
        .await?
        .with_code(CodeKind::Password, generated))
}

/// Handles [`CreateInitCode`]: issues a fresh initialization code.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for machine users.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_create_init_code(
    command: &CreateInitCode,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.human()?;
    let generated = services.codes.init.generate()?;
    let event = UserEventKind::InitCodeAdded(issued(&generated));
    Ok(commit_events(user, &[event], ctx, services)
        .await?
        .with_code(CodeKind::Init, generated))
}

/// Handles [`VerifyInitCode`]: consumes the init code, optionally sets the
/// first password and marks the email verified. A wrong or expired code is
/// recorded before the error is returned.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for an empty code,
/// `DomainError::NotFound` if no init code was issued and
/// `DomainError::InvalidArgument` for a wrong or expired code or a
/// password violating the policy.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_verify_init_code(
    command: &VerifyInitCode,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let supplied = require_code(&command.code)?;
    let user = load_user(&command.user_id, services).await?;
    let human = user.human()?;
    let pending = human
        .init_code
        .clone()
        .ok_or_else(|| DomainError::NotFound(format!("init code of user {}", user.id)))?;
    let email_verified = human.email.verified;
    let password = match command.password.as_deref() {
        Some(plain) => Some(hash_password(plain, false, services).await?),
        None => None,
    };

    if let Err(e) = verify_pending(services.codes.init.as_ref(), &pending, supplied, services.clock.now()) {
        return record_failure(user, UserEventKind::InitCodeCheckFailed, e, ctx, services).await;
    }
    let mut events = Vec::new();
    if let Some(password) = password {
        events.push(UserEventKind::PasswordChanged(password));
    }
    events.push(UserEventKind::InitCodeVerified);
    if !email_verified {
        events.push(UserEventKind::EmailVerified);
    }
    commit_events(user, &events, ctx, services).await
}

/// Handles [`MarkCodeSent`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for machine users.
#[instrument(skip_all, fields(user_id = %command.user_id, kind = ?command.kind))]
pub async fn handle_mark_code_sent(
    command: &MarkCodeSent,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.human()?;
    let event = match command.kind {
        CodeKind::Init => UserEventKind::InitCodeSent,
        CodeKind::Email => UserEventKind::EmailCodeSent,
        CodeKind::Phone => UserEventKind::PhoneCodeSent,
        CodeKind::Password => UserEventKind::PasswordCodeSent,
    };
    commit_events(user, &[event], ctx, services).await
}

/// Handles [`AddOtp`]: generates a TOTP secret awaiting setup confirmation.
///
/// # Errors
///
/// Returns `DomainError::AlreadyExists` if an OTP is already set up.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_add_otp(
    command: &AddOtp,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.ensure_otp_addable()?;
    let account_name = command
        .account_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| user.otp_account_name(), str::to_owned);
    let key = services.otp.generate(&account_name)?;
    let event = UserEventKind::OtpAdded(OtpAdded {
        secret: key.secret.clone(),
    });
    let mut result = commit_events(user, &[event], ctx, services).await?;
    result.otp = Some(key);
    Ok(result)
}

/// Handles [`CheckOtpSetup`]: confirms enrollment with a first code. A
/// wrong code is not recorded.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if there is no OTP or it is
/// already set up and `DomainError::InvalidArgument` for a wrong code.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_check_otp_setup(
    command: &CheckOtpSetup,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    let otp = user.otp_pending_setup()?;
    if !services
        .otp
        .validate(&otp.secret, command.code.trim(), services.clock.now())?
    {
        return Err(DomainError::InvalidArgument("otp code is invalid".into()));
    }
    commit_events(user, &[UserEventKind::OtpVerified], ctx, services).await
}

/// Handles [`CheckOtp`]. Both outcomes are recorded.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for locked or inactive users
/// or without a ready OTP, and `DomainError::InvalidArgument` for a wrong
/// code.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_check_otp(
    command: &CheckOtp,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.ensure_can_authenticate()?;
    let otp = user.otp_ready()?;
    if services
        .otp
        .validate(&otp.secret, command.code.trim(), services.clock.now())?
    {
        return commit_events(user, &[UserEventKind::OtpCheckSucceeded], ctx, services).await;
    }
    record_failure(
        user,
        UserEventKind::OtpCheckFailed,
        DomainError::InvalidArgument("otp code is invalid".into()),
        ctx,
        services,
    )
    .await
}

/// Handles [`RemoveOtp`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if there is no OTP.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_remove_otp(
    command: &RemoveOtp,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    transition(&command.user_id, ctx, services, User::remove_otp).await
}

/// Handles [`SkipMfaInit`].
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` for machine users.
#[instrument(skip_all, fields(user_id = %command.user_id))]
pub async fn handle_skip_mfa_init(
    command: &SkipMfaInit,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    let user = load_user(&command.user_id, services).await?;
    user.human()?;
    commit_events(user, &[UserEventKind::MfaInitSkipped], ctx, services).await
}

/// Dispatches any [`UserCommand`] to its handler.
///
/// # Errors
///
/// Returns whatever the selected handler returns.
pub async fn handle(
    command: &UserCommand,
    ctx: &CommandContext,
    services: &UserServices,
) -> Result<UserCommandResult, DomainError> {
    match command {
        UserCommand::AddHuman(c) => handle_add_human(c, ctx, services).await,
        UserCommand::RegisterHuman(c) => handle_register_human(c, ctx, services).await,
        UserCommand::AddMachine(c) => handle_add_machine(c, ctx, services).await,
        UserCommand::ChangeUsername(c) => handle_change_username(c, ctx, services).await,
        UserCommand::Deactivate(c) => handle_deactivate(c, ctx, services).await,
        UserCommand::Reactivate(c) => handle_reactivate(c, ctx, services).await,
        UserCommand::Lock(c) => handle_lock(c, ctx, services).await,
        UserCommand::Unlock(c) => handle_unlock(c, ctx, services).await,
        UserCommand::Remove(c) => handle_remove_user(c, ctx, services).await,
        UserCommand::ChangeProfile(c) => handle_change_profile(c, ctx, services).await,
        UserCommand::ChangeMachine(c) => handle_change_machine(c, ctx, services).await,
        UserCommand::ChangeEmail(c) => handle_change_email(c, ctx, services).await,
        UserCommand::VerifyEmail(c) => handle_verify_email(c, ctx, services).await,
        UserCommand::CreateEmailVerificationCode(c) => {
            handle_create_email_verification_code(c, ctx, services).await
        }
        UserCommand::ChangePhone(c) => handle_change_phone(c, ctx, services).await,
        UserCommand::VerifyPhone(c) => handle_verify_phone(c, ctx, services).await,
        UserCommand::CreatePhoneVerificationCode(c) => {
            handle_create_phone_verification_code(c, ctx, services).await
        }
        UserCommand::RemovePhone(c) => handle_remove_phone(c, ctx, services).await,
        UserCommand::ChangeAddress(c) => handle_change_address(c, ctx, services).await,
        UserCommand::SetPassword(c) => handle_set_password(c, ctx, services).await,
        UserCommand::SetOneTimePassword(c) => handle_set_one_time_password(c, ctx, services).await,
        UserCommand::ChangePassword(c) => handle_change_password(c, ctx, services).await,
        UserCommand::CheckPassword(c) => handle_check_password(c, ctx, services).await,
        UserCommand::RequestSetPassword(c) => handle_request_set_password(c, ctx, services).await,
        UserCommand::CreateInitCode(c) => handle_create_init_code(c, ctx, services).await,
        UserCommand::VerifyInitCode(c) => handle_verify_init_code(c, ctx, services).await,
        UserCommand::MarkCodeSent(c) => handle_mark_code_sent(c, ctx, services).await,
        UserCommand::AddOtp(c) => handle_add_otp(c, ctx, services).await,
        UserCommand::CheckOtpSetup(c) => handle_check_otp_setup(c, ctx, services).await,
        UserCommand::CheckOtp(c) => handle_check_otp(c, ctx, services).await,
        UserCommand::RemoveOtp(c) => handle_remove_otp(c, ctx, services).await,
        UserCommand::SkipMfaInit(c) => handle_skip_mfa_init(c, ctx, services).await,
    }
}
