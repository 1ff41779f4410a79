//! Routes for creating users and driving their lifecycle.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};

use keyward_user::application::query_handlers::{self, UserChange, UserView};
use keyward_user::application::command_handlers;
use keyward_user::domain::aggregates::{Address, Profile};
use keyward_user::domain::commands::{self, NewEmail, NewHuman, NewPhone};

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::routes::CommandResponse;
use crate::state::AppState;

/// Email part of [`CreateHumanRequest`].
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    /// The address.
    pub address: String,
    /// Whether the caller already verified it.
    #[serde(default)]
    pub verified: bool,
}

/// Phone part of [`CreateHumanRequest`].
#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    /// The number.
    pub number: String,
    /// Whether the caller already verified it.
    #[serde(default)]
    pub verified: bool,
}

/// Request body for POST / and POST /register.
#[derive(Deserialize)]
pub struct CreateHumanRequest {
    /// Login name.
    pub user_name: String,
    /// Names and preferences.
    pub profile: Profile,
    /// Email address.
    pub email: EmailRequest,
    /// Optional phone.
    pub phone: Option<PhoneRequest>,
    /// Optional postal address.
    pub address: Option<Address>,
    /// Optional initial password; without one an init code is issued.
    pub password: Option<String>,
    /// Force a password change at first login.
    #[serde(default)]
    pub password_change_required: bool,
}

impl From<CreateHumanRequest> for NewHuman {
    fn from(request: CreateHumanRequest) -> Self {
        Self {
            user_name: request.user_name,
            profile: request.profile,
            email: NewEmail {
                address: request.email.address,
                verified: request.email.verified,
            },
            phone: request.phone.map(|p| NewPhone {
                number: p.number,
                verified: p.verified,
            }),
            address: request.address,
            password: request.password,
            password_change_required: request.password_change_required,
        }
    }
}

/// Request body for POST /machines and PUT /{user_id}/machine.
#[derive(Debug, Deserialize)]
pub struct MachineRequest {
    /// Login name; ignored by PUT.
    #[serde(default)]
    pub user_name: String,
    /// Display name.
    pub name: String,
    /// Free text.
    #[serde(default)]
    pub description: String,
}

/// Request body for PUT /{user_id}/username.
#[derive(Debug, Deserialize)]
pub struct ChangeUsernameRequest {
    /// The new login name.
    pub user_name: String,
}

/// Query string of GET /{user_id}/changes.
#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    /// Only events after this sequence.
    #[serde(default)]
    pub after_sequence: i64,
    /// Maximum number of entries; 0 for all.
    #[serde(default)]
    pub limit: u64,
    /// Newest first.
    #[serde(default)]
    pub desc: bool,
}

/// POST /
#[instrument(skip(state, ctx, request), fields(user_name = %request.user_name))]
async fn add_human(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(request): Json<CreateHumanRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling add_human command");
    let command = commands::AddHuman {
        human: request.into(),
    };
    let result = command_handlers::handle_add_human(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /register
#[instrument(skip(state, ctx, request), fields(user_name = %request.user_name))]
async fn register_human(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(request): Json<CreateHumanRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling register_human command");
    let command = commands::RegisterHuman {
        human: request.into(),
    };
    let result = command_handlers::handle_register_human(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /machines
#[instrument(skip(state, ctx, request), fields(user_name = %request.user_name))]
async fn add_machine(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(request): Json<MachineRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling add_machine command");
    let command = commands::AddMachine {
        user_name: request.user_name,
        name: request.name,
        description: request.description,
    };
    let result = command_handlers::handle_add_machine(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// GET /{user_id}
#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    let view = query_handlers::get_user_by_id(&user_id, &state.users).await?;
    Ok(Json(view))
}

/// GET /{user_id}/changes
#[instrument(skip(state))]
async fn user_changes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ChangesQuery>,
) -> Result<Json<Vec<UserChange>>, ApiError> {
    let changes = query_handlers::user_changes(
        &user_id,
        query.after_sequence,
        query.limit,
        !query.desc,
        &state.users,
    )
    .await?;
    Ok(Json(changes))
}

/// PUT /{user_id}/username
#[instrument(skip(state, ctx, request))]
async fn change_username(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<ChangeUsernameRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling change_username command");
    let command = commands::ChangeUsername {
        user_id,
        user_name: request.user_name,
    };
    let result = command_handlers::handle_change_username(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// PUT /{user_id}/machine
#[instrument(skip(state, ctx, request))]
async fn change_machine(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(request): Json<MachineRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling change_machine command");
    let command = commands::ChangeMachine {
        user_id,
        name: request.name,
        description: request.description,
    };
    let result = command_handlers::handle_change_machine(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/deactivate
#[instrument(skip(state, ctx))]
async fn deactivate(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling deactivate command");
    let command = commands::DeactivateUser { user_id };
    let result = command_handlers::handle_deactivate(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/reactivate
#[instrument(skip(state, ctx))]
async fn reactivate(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling reactivate command");
    let command = commands::ReactivateUser { user_id };
    let result = command_handlers::handle_reactivate(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/lock
#[instrument(skip(state, ctx))]
async fn lock(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling lock command");
    let command = commands::LockUser { user_id };
    let result = command_handlers::handle_lock(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// POST /{user_id}/unlock
#[instrument(skip(state, ctx))]
async fn unlock(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling unlock command");
    let command = commands::UnlockUser { user_id };
    let result = command_handlers::handle_unlock(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// DELETE /{user_id}
#[instrument(skip(state, ctx))]
async fn remove_user(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(correlation_id = %ctx.correlation_id, "handling remove_user command");
    let command = commands::RemoveUser { user_id };
    let result = command_handlers::handle_remove_user(&command, &ctx, &state.users).await?;
    Ok(Json(result.into()))
}

/// Returns the router for user creation and lifecycle.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(add_human))
        .route("/register", post(register_human))
        .route("/machines", post(add_machine))
        .route("/{user_id}", get(get_user).delete(remove_user))
        .route("/{user_id}/changes", get(user_changes))
        .route("/{user_id}/username", put(change_username))
        .route("/{user_id}/machine", put(change_machine))
        .route("/{user_id}/deactivate", post(deactivate))
        .route("/{user_id}/reactivate", post(reactivate))
        .route("/{user_id}/lock", post(lock))
        .route("/{user_id}/unlock", post(unlock))
}
