//! HTTP API over the user identity context.

pub mod config;
pub mod context;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    // TODO: Read allowed CORS origins from Config instead of allowing any.
    Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/v1/users",
            routes::users::router()
                .merge(routes::contact::router())
                .merge(routes::credentials::router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
