//! Routes for profile, email, phone and address.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};

use keyward_user::application::command_handlers;
use keyward_user::application::query_handlers;
use keyward_user::domain::aggregates::{Address, Email, Phone, Profile};
use keyward_user::domain::commands;

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::routes::CommandResponse;
use crate::state::AppState;

/// Request body for PUT /{user_id}/email.
#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    /// The new address.
    pub address: String,
    /// Skip verification.
    #[serde(default)]
    pub verified: bool,
}

/// Request body for PUT /{user_id}/phone.
#[derive(Debug, Deserialize)]
pub struct ChangePhoneRequest {
    /// The new number.
    pub number: String,
    /// Skip verification.
    #[serde(default)]
    pub verified: bool,
}

/// Request body carrying a verification code.
#[derive(Deserialize)]
pub struct CodeRequest {
    /// The code as delivered to the user.
    pub code: String,
}

/// GET /{user_id}/profile
#[instrument(skip(state))]
async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(query_handlers::get_profile(&user_id, &state.users).await?))
}

/// PUT /{user_id}/profile
#[instrument(skip(state, ctx, profile))]
async fn change_profile(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(profile): Json<Profile>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling change_profile command");
    let command = commands::ChangeProfile { user_id, profile };
    let result = command_handlers::handle_change_profile(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// GET /{user_id}/email
#[instrument(skip(state))]
async fn get_email(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Email>, ApiError> {
    Ok(Json(query_handlers::get_email(&user_id, &state.users).await?))
}

/// PUT /{user_id}/email
#[instrument(skip(state, ctx, request))]
async fn change_email(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<ChangeEmailRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling change_email command");
    let command = commands::ChangeEmail {
        user_id,
        address: request.address,
        verified: request.verified,
    };
    let result = command_handlers::handle_change_email(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/email/verify
#[instrument(skip(state, ctx, request))]
async fn verify_email(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling verify_email command");
    let command = commands::VerifyEmail {
        user_id,
        code: request.code,
    };
    let result = command_handlers::handle_verify_email(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/email/code
#[instrument(skip(state, ctx))]
async fn create_email_code(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling create_email_verification_code command");
    let command = commands::CreateEmailVerificationCode { user_id };
    let result =
        command_handlers::handle_create_email_verification_code(&command, &ctx, &state.users)
            .await?;
    Ok(Json(result.into()))
}

/// GET /{user_id}/phone
#[instrument(skip(state))]
async fn get_phone(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Phone>, ApiError> {
    Ok(Json(query_handlers::get_phone(&user_id, &state.users).await?))
}

/// PUT /{user_id}/phone
#[instrument(skip(state, ctx, request))]
async fn change_phone(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<ChangePhoneRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling change_phone command");
    let command = commands::ChangePhone {
        user_id,
        number: request.number,
        verified: request.verified,
    };
    let result = command_handlers::handle_change_phone(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// DELETE /{user_id}/phone
#[instrument(skip(state, ctx))]
async fn remove_phone(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling remove_phone command");
    let command = commands::RemovePhone { user_id };
    let result = command_handlers::handle_remove_phone(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/phone/verify
#[instrument(skip(state, ctx, request))]
async fn verify_phone(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling verify_phone command");
    let command = commands::VerifyPhone {
        user_id,
        code: request.code,
    };
    let result = command_handlers::handle_verify_phone(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/phone/code
#[instrument(skip(state, ctx))]
async fn create_phone_code(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling create_phone_verification_code command");
    let command = commands::CreatePhoneVerificationCode { user_id };
    let result =
        command_handlers::handle_create_phone_verification_code(&command, &ctx, &state.users)
            .await?;
    Ok(Json(result.into()))
}

/// GET /{user_id}/address
#[instrument(skip(state))]
async fn get_address(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Address>, ApiError> {
    Ok(Json(query_handlers::get_address(&user_id, &state.users).await?))
}

/// PUT /{user_id}/address
#[instrument(skip(state, ctx, address))]
async fn change_address(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(address): Json<Address>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling change_address command");
    let command = commands::ChangeAddress { user_id, address };
    let result = command_handlers::handle_change_address(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// Returns the router for contact data.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}/profile", get(get_profile).put(change_profile))
        .route("/{user_id}/email", get(get_email).put(change_email))
        .route("/{user_id}/email/verify", post(verify_email))
        .route("/{user_id}/email/code", post(create_email_code))
        .route(
            "/{user_id}/phone",
            get(get_phone).put(change_phone).delete(remove_phone),
        )
        .route("/{user_id}/phone/verify", post(verify_phone))
        .route("/{user_id}/phone/code", post(create_phone_code))
        .route("/{user_id}/address", get(get_address).put(change_address))
}
