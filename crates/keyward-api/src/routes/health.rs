//! Liveness and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use keyward_core::aggregate::AggregateRoot;
use keyward_user::domain::aggregates::User;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

fn health(status: &str) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: status.to_owned(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    health("ok")
}

/// GET /ready: the event log answers a query.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.users.log.latest_sequence(User::AGGREGATE_TYPE, "").await {
        Ok(_) => (StatusCode::OK, health("ok")),
        Err(e) => {
            tracing::warn!(error = %e, "event log is not reachable");
            (StatusCode::SERVICE_UNAVAILABLE, health("unavailable"))
        }
    }
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
}
