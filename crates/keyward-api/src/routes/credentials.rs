//! Routes for passwords, init codes, OTP and MFA.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use keyward_core::error::DomainError;
use serde::Deserialize;
use tracing::{info, instrument};

use keyward_user::application::command_handlers;
use keyward_user::domain::commands::{self, CodeKind};

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::routes::contact::CodeRequest;
use crate::routes::{CommandResponse, code_kind_name};
use crate::state::AppState;

/// Request body for POST /{user_id}/password.
#[derive(Deserialize)]
pub struct SetPasswordRequest {
    /// The reset code.
    pub code: String,
    /// The new password.
    pub password: String,
}

/// Request body carrying only a password.
#[derive(Deserialize)]
pub struct PasswordRequest {
    /// The password.
    pub password: String,
}

/// Request body for POST /{user_id}/password/change.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    /// The current password.
    pub old_password: String,
    /// The new password.
    pub new_password: String,
}

/// Request body for POST /{user_id}/init/verify.
#[derive(Deserialize)]
pub struct VerifyInitCodeRequest {
    /// The init code.
    pub code: String,
    /// Optional password to set along with the verification.
    pub password: Option<String>,
}

/// Request body for POST /{user_id}/otp.
#[derive(Debug, Default, Deserialize)]
pub struct AddOtpRequest {
    /// Label shown in the authenticator; defaults to the email address.
    #[serde(default)]
    pub account_name: Option<String>,
}

fn parse_code_kind(raw: &str) -> Result<CodeKind, DomainError> {
    [CodeKind::Init, CodeKind::Email, CodeKind::Phone, CodeKind::Password]
        .into_iter()
        .find(|kind| code_kind_name(*kind) == raw)
        .ok_or_else(|| DomainError::InvalidArgument(format!("unknown code kind {raw}")))
}

/// POST /{user_id}/password
#[instrument(skip(state, ctx, request))]
async fn set_password(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<SetPasswordRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling set_password command");
    let command = commands::SetPassword {
        user_id,
        code: request.code,
        password: request.password,
    };
    let result = command_handlers::handle_set_password(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/password/one-time
#[instrument(skip(state, ctx, request))]
async fn set_one_time_password(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<PasswordRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling set_one_time_password command");
    let command = commands::SetOneTimePassword {
        user_id,
        password: request.password,
    };
    let result =
        command_handlers::handle_set_one_time_password(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/password/change
#[instrument(skip(state, ctx, request))]
async fn change_password(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling change_password command");
    let command = commands::ChangePassword {
        user_id,
        old_password: request.old_password,
        new_password: request.new_password,
    };
    let result = command_handlers::handle_change_password(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/password/check
#[instrument(skip(state, ctx, request))]
async fn check_password(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<PasswordRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling check_password command");
    let command = commands::CheckPassword {
        user_id,
        password: request.password,
    };
    let result = command_handlers::handle_check_password(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/password/reset
#[instrument(skip(state, ctx))]
async fn request_set_password(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling request_set_password command");
    let command = commands::RequestSetPassword { user_id };
    let result =
        command_handlers::handle_request_set_password(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/init/code
#[instrument(skip(state, ctx))]
async fn create_init_code(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling create_init_code command");
    let command = commands::CreateInitCode { user_id };
    let result = command_handlers::handle_create_init_code(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/init/verify
#[instrument(skip(state, ctx, request))]
async fn verify_init_code(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<VerifyInitCodeRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling verify_init_code command");
    let command = commands::VerifyInitCode {
        user_id,
        code: request.code,
        password: request.password,
    };
    let result = command_handlers::handle_verify_init_code(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/codes/{kind}/sent
#[instrument(skip(state, ctx))]
async fn mark_code_sent(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path((user_id, kind)): Path<(String, String)>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling mark_code_sent command");
    let command = commands::MarkCodeSent {
        user_id,
        kind: parse_code_kind(&kind)?,
    };
    let result = command_handlers::handle_mark_code_sent(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/otp
#[instrument(skip(state, ctx, request))]
async fn add_otp(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<AddOtpRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling add_otp command");
    let command = commands::AddOtp {
        user_id,
        account_name: request.account_name,
    };
    let result = command_handlers::handle_add_otp(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// DELETE /{user_id}/otp
#[instrument(skip(state, ctx))]
async fn remove_otp(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling remove_otp command");
    let command = commands::RemoveOtp { user_id };
    let result = command_handlers::handle_remove_otp(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/otp/setup
#[instrument(skip(state, ctx, request))]
async fn check_otp_setup(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling check_otp_setup command");
    let command = commands::CheckOtpSetup {
        user_id,
        code: request.code,
    };
    let result = command_handlers::handle_check_otp_setup(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/otp/check
#[instrument(skip(state, ctx, request))]
async fn check_otp(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling check_otp command");
    let command = commands::CheckOtp {
        user_id,
        code: request.code,
    };
    let result = command_handlers::handle_check_otp(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/mfa/skip
#[instrument(skip(state, ctx))]
async fn skip_mfa_init(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling skip_mfa_init command");
    let command = commands::SkipMfaInit { user_id };
    let result = command_handlers::handle_skip_mfa_init(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// Returns the router for credentials and MFA.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}/password", post(set_password))
        .route("/{user_id}/password/one-time", post(set_one_time_password))
        .route("/{user_id}/password/change", post(change_password))
        .route("/{user_id}/password/check", post(check_password))
        .route("/{user_id}/password/reset", post(request_set_password))
        .route("/{user_id}/init/code", post(create_init_code))
        .route("/{user_id}/init/verify", post(verify_init_code))
        .route("/{user_id}/codes/{kind}/sent", post(mark_code_sent))
        .route("/{user_id}/otp", post(add_otp).delete(remove_otp))
        .route("/{user_id}/otp/setup", post(check_otp_setup))
        .route("/{user_id}/otp/check", post(check_otp))
        .route("/{user_id}/mfa/skip", post(skip_mfa_init))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_kind() {
        assert_eq!(parse_code_kind("init").unwrap(), CodeKind::Init);
        assert_eq!(parse_code_kind("password").unwrap(), CodeKind::Password);
        match parse_code_kind("sms") {
            Err(DomainError::InvalidArgument(msg)) => assert_eq!(msg, "unknown code kind sms"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }
}
