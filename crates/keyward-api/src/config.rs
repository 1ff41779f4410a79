//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;
use keyward_user::domain::policy::UsernameScope;

use crate::error::AppError;

/// Runtime configuration of the API server.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL URL; `None` runs against an in-memory log.
    pub database_url: Option<String>,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Pool size.
    pub database_max_connections: u32,
    /// Base64 AES-256 key for verification codes.
    pub code_key: String,
    /// Base64 AES-256 key for TOTP secrets.
    pub otp_key: String,
    /// Issuer shown in authenticator apps.
    pub otp_issuer: String,
    /// bcrypt cost.
    pub password_cost: u32,
    /// Where usernames must be unique.
    pub username_scope: UsernameScope,
    /// Maximum number of cached user snapshots.
    pub cache_capacity: usize,
    /// Lifetime of init codes.
    pub init_code_ttl: Duration,
    /// Lifetime of email codes.
    pub email_code_ttl: Duration,
    /// Lifetime of phone codes.
    pub phone_code_ttl: Duration,
    /// Lifetime of password reset codes.
    pub password_code_ttl: Duration,
    /// OTLP collector endpoint; `None` disables trace export.
    pub otel_endpoint: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_max_connections", &self.database_max_connections)
            .field("otp_issuer", &self.otp_issuer)
            .field("password_cost", &self.password_cost)
            .field("username_scope", &self.username_scope)
            .field("cache_capacity", &self.cache_capacity)
            .field("otel_endpoint", &self.otel_endpoint)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Reads the configuration from the process environment, loading a
    /// `.env` file first if one exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| AppError::Config(format!("{key} must be set")))
        };

        let username_scope = match var("KEYWARD_USERNAME_SCOPE").as_deref() {
            None | Some("global") => UsernameScope::Global,
            Some("organization") => UsernameScope::Organization,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "KEYWARD_USERNAME_SCOPE must be global or organization, got {other}"
                )));
            }
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parsed(&var, "PORT", 3000)?,
            database_max_connections: parsed(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            code_key: required("KEYWARD_CODE_KEY")?,
            otp_key: required("KEYWARD_OTP_KEY")?,
            otp_issuer: var("KEYWARD_OTP_ISSUER").unwrap_or_else(|| "keyward".to_owned()),
            password_cost: parsed(&var, "KEYWARD_PASSWORD_COST", 12)?,
            username_scope,
            cache_capacity: parsed(&var, "KEYWARD_CACHE_CAPACITY", 10_000)?,
            init_code_ttl: ttl(&var, "KEYWARD_INIT_CODE_TTL_SECS", Duration::hours(72))?,
            email_code_ttl: ttl(&var, "KEYWARD_EMAIL_CODE_TTL_SECS", Duration::hours(1))?,
            phone_code_ttl: ttl(&var, "KEYWARD_PHONE_CODE_TTL_SECS", Duration::hours(1))?,
            password_code_ttl: ttl(&var, "KEYWARD_PASSWORD_CODE_TTL_SECS", Duration::hours(1))?,
            otel_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parsed<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}

fn ttl(
    var: impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, AppError> {
    let secs: i64 = parsed(var, key, default.num_seconds())?;
    if secs <= 0 {
        return Err(AppError::Config(format!("{key} must be positive")));
    }
    Ok(Duration::seconds(secs))
}
