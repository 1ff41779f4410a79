//! Policies consulted by user commands.

use keyward_core::error::DomainError;
use keyward_core::unique::UniqueConstraint;

/// Reservation namespace for login names.
pub const USERNAMES: UniqueConstraint = UniqueConstraint::new("user.username");

/// Reservation namespace for email addresses.
pub const EMAILS: UniqueConstraint = UniqueConstraint::new("user.email");

/// Longest accepted username, in characters.
pub const MAX_USER_NAME_LENGTH: usize = 200;

/// Longest accepted email address, in characters.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Longest accepted password, in bytes. bcrypt ignores anything beyond.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Fails if `user_name` is longer than [`MAX_USER_NAME_LENGTH`].
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` for an overlong username.
pub fn check_user_name_length(user_name: &str) -> Result<(), DomainError> {
    check_length("username", user_name, MAX_USER_NAME_LENGTH)
}

/// Fails if `address` is longer than [`MAX_EMAIL_LENGTH`].
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` for an overlong address.
pub fn check_email_length(address: &str) -> Result<(), DomainError> {
    check_length("email", address, MAX_EMAIL_LENGTH)
}

fn check_length(what: &str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::InvalidArgument(format!(
            "{what} must not exceed {max} characters"
        )));
    }
    Ok(())
}

/// Requirements a new password must meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordComplexityPolicy {
    /// Minimum length in characters.
    pub min_length: usize,
    /// Maximum length in bytes.
    pub max_bytes: usize,
    /// Requires a lowercase letter.
    pub has_lowercase: bool,
    /// Requires an uppercase letter.
    pub has_uppercase: bool,
    /// Requires a digit.
    pub has_number: bool,
    /// Requires a character that is neither a letter nor a digit.
    pub has_symbol: bool,
}

impl Default for PasswordComplexityPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_bytes: MAX_PASSWORD_BYTES,
            has_lowercase: true,
            has_uppercase: true,
            has_number: true,
            has_symbol: false,
        }
    }
}

impl PasswordComplexityPolicy {
    /// Checks `password` against the policy.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` naming the first unmet rule.
    pub fn check(&self, password: &str) -> Result<(), DomainError> {
        if password.chars().count() < self.min_length {
            return Err(DomainError::InvalidArgument(format!(
                "password must have at least {} characters",
                self.min_length
            )));
        }
        if password.len() > self.max_bytes {
            return Err(DomainError::InvalidArgument(format!(
                "password must not exceed {} bytes",
                self.max_bytes
            )));
        }
        if self.has_lowercase && !password.chars().any(char::is_lowercase) {
            return Err(DomainError::InvalidArgument(
                "password must contain a lowercase letter".into(),
            ));
        }
        if self.has_uppercase && !password.chars().any(char::is_uppercase) {
            return Err(DomainError::InvalidArgument(
                "password must contain an uppercase letter".into(),
            ));
        }
        if self.has_number && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(DomainError::InvalidArgument("password must contain a number".into()));
        }
        if self.has_symbol && password.chars().all(char::is_alphanumeric) {
            return Err(DomainError::InvalidArgument("password must contain a symbol".into()));
        }
        Ok(())
    }
}

/// Where a username must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsernameScope {
    /// Across all organizations.
    #[default]
    Global,
    /// Within the owning organization.
    Organization,
}

/// Scoping of unique values. Emails are always unique per organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UniquenessPolicy {
    /// Scope of usernames.
    pub username_scope: UsernameScope,
}

impl UniquenessPolicy {
    /// Reservation scope for a username owned by `resource_owner`.
    #[must_use]
    pub fn username_scope<'a>(&self, resource_owner: &'a str) -> &'a str {
        match self.username_scope {
            UsernameScope::Global => "",
            UsernameScope::Organization => resource_owner,
        }
    }

    /// Reservation scope for an email owned by `resource_owner`.
    #[must_use]
    pub fn email_scope<'a>(&self, resource_owner: &'a str) -> &'a str {
        resource_owner
    }
}
