//! Route modules and the response shapes they share.

pub mod contact;
pub mod credentials;
pub mod health;
pub mod users;

use chrono::{DateTime, Utc};
use keyward_user::application::command_handlers::UserCommandResult;
use keyward_user::domain::commands::CodeKind;
use serde::Serialize;

/// A code issued by a command, returned to the caller for delivery.
#[derive(Debug, Serialize)]
pub struct IssuedCodeResponse {
    /// `init`, `email`, `phone` or `password`.
    pub kind: &'static str,
    /// The plaintext code.
    pub code: String,
}

/// Provisioning data of a freshly added TOTP factor.
#[derive(Debug, Serialize)]
pub struct OtpResponse {
    /// `otpauth://` URL for QR rendering.
    pub url: String,
    /// Base32 secret for manual entry.
    pub secret: String,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The affected user.
    pub user_id: String,
    /// Sequence of the last event on the user stream.
    pub sequence: i64,
    /// Owning organization.
    pub resource_owner: String,
    /// Time of that event.
    pub event_date: DateTime<Utc>,
    /// Codes issued by the command.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<IssuedCodeResponse>,
    /// TOTP provisioning data, for OTP enrollment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<OtpResponse>,
}

impl From<UserCommandResult> for CommandResponse {
    fn from(result: UserCommandResult) -> Self {
        Self {
            user_id: result.aggregate_id,
            sequence: result.details.sequence,
            resource_owner: result.details.resource_owner,
            event_date: result.details.event_date,
            codes: result
                .codes
                .into_iter()
                .map(|c| IssuedCodeResponse {
                    kind: code_kind_name(c.kind),
                    code: c.value,
                })
                .collect(),
            otp: result.otp.map(|key| OtpResponse {
                url: key.url,
                secret: key.plain_secret,
            }),
        }
    }
}

/// Path name of a code kind.
#[must_use]
pub fn code_kind_name(kind: CodeKind) -> &'static str {
    match kind {
        CodeKind::Init => "init",
        CodeKind::Email => "email",
        CodeKind::Phone => "phone",
        CodeKind::Password => "password",
    }
}
