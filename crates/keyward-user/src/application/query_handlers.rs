//! Query handlers for the user identity context.
//!
//! Reads go through the same read-through cache as commands, so a query
//! always sees every event committed before it started.

use chrono::{DateTime, Utc};
use keyward_core::aggregate::AggregateRoot;
use keyward_core::cache::load_through;
use keyward_core::error::DomainError;
use keyward_core::query::SearchQuery;
use serde::Serialize;

use crate::application::services::UserServices;
use crate::domain::aggregates::{Address, Email, Machine, Phone, Profile, User, UserState};

/// Enrollment state of the TOTP factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpState {
    /// Not enrolled.
    None,
    /// Secret generated, setup not confirmed.
    Pending,
    /// Usable.
    Ready,
}

/// Read-only view of a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    /// The user identifier.
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
    /// Human profile, for human users.
    pub profile: Option<Profile>,
    /// Email, for human users.
    pub email: Option<Email>,
    /// Phone, if any.
    pub phone: Option<Phone>,
    /// Postal address, if any.
    pub address: Option<Address>,
    /// Machine data, for machine users.
    pub machine: Option<Machine>,
    /// Whether a password is set.
    pub password_set: bool,
    /// Whether the password must be changed at next login.
    pub password_change_required: bool,
    /// TOTP enrollment state.
    pub otp: OtpState,
    /// When MFA enrollment was last skipped.
    pub mfa_init_skipped: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        let human = user.human.as_ref();
        let password = human.and_then(|h| h.password.as_ref());
        let otp = match human.and_then(|h| h.otp.as_ref()) {
            None => OtpState::None,
            Some(otp) if otp.ready => OtpState::Ready,
            Some(_) => OtpState::Pending,
        };
        Self {
            id: user.id.clone(),
            resource_owner: user.resource_owner.clone(),
            sequence: user.sequence,
            creation_date: user.creation_date,
            change_date: user.change_date,
            user_name: user.user_name.clone(),
            state: user.state,
            profile: human.map(|h| h.profile.clone()),
            email: human.map(|h| h.email.clone()),
            phone: human.and_then(|h| h.phone.clone()),
            address: human.and_then(|h| h.address.clone()),
            machine: user.machine.clone(),
            password_set: password.is_some(),
            password_change_required: password.is_some_and(|p| p.change_required),
            otp,
            mfa_init_skipped: human.and_then(|h| h.mfa_init_skipped),
        }
    }
}

/// One entry of a user's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserChange {
    /// Sequence of the event.
    pub sequence: i64,
    /// Event type.
    pub event_type: String,
    /// Who caused it.
    pub editor_id: String,
    /// When.
    pub created_at: DateTime<Utc>,
}

async fn load_user(user_id: &str, services: &UserServices) -> Result<User, DomainError> {
    let user = load_through(user_id, services.log.as_ref(), &services.cache).await?;
    user.ensure_exists()?;
    Ok(user)
}

/// Retrieves a user by id.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for unknown or removed users.
pub async fn get_user_by_id(user_id: &str, services: &UserServices) -> Result<UserView, DomainError> {
    let user = load_user(user_id, services).await?;
    Ok(UserView::from(&user))
}

/// Retrieves a human's profile.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for machine users.
pub async fn get_profile(user_id: &str, services: &UserServices) -> Result<Profile, DomainError> {
    let user = load_user(user_id, services).await?;
    user.human
        .map(|h| h.profile)
        .ok_or_else(|| DomainError::NotFound(format!("profile of user {user_id}")))
}

/// Retrieves a human's email.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for machine users.
pub async fn get_email(user_id: &str, services: &UserServices) -> Result<Email, DomainError> {
    let user = load_user(user_id, services).await?;
    user.human
        .map(|h| h.email)
        .ok_or_else(|| DomainError::NotFound(format!("email of user {user_id}")))
}

/// Retrieves a human's phone.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user has no phone.
pub async fn get_phone(user_id: &str, services: &UserServices) -> Result<Phone, DomainError> {
    let user = load_user(user_id, services).await?;
    user.human
        .and_then(|h| h.phone)
        .ok_or_else(|| DomainError::NotFound(format!("phone of user {user_id}")))
}

/// Retrieves a human's postal address.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user has no address.
pub async fn get_address(user_id: &str, services: &UserServices) -> Result<Address, DomainError> {
    let user = load_user(user_id, services).await?;
    user.human
        .and_then(|h| h.address)
        .ok_or_else(|| DomainError::NotFound(format!("address of user {user_id}")))
}

/// Lists the events of a user's stream after `after_sequence`, read
/// straight from the log.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if there are no such events.
pub async fn user_changes(
    user_id: &str,
    after_sequence: i64,
    limit: u64,
    ascending: bool,
    services: &UserServices,
) -> Result<Vec<UserChange>, DomainError> {
    let mut query = SearchQuery::stream_after(User::AGGREGATE_TYPE, user_id, after_sequence).limit(limit);
    if !ascending {
        query = query.order_desc();
    }
    let events = services.log.filter(&query).await?;
    if events.is_empty() {
        return Err(DomainError::NotFound(format!("changes of user {user_id}")));
    }
    Ok(events
        .into_iter()
        .map(|e| UserChange {
            sequence: e.sequence,
            event_type: e.event_type,
            editor_id: e.editor_id,
            created_at: e.created_at,
        })
        .collect())
}
