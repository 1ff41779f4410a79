//! Keyward API server entry point.

use std::sync::Arc;

use keyward_api::config::Config;
use keyward_api::error::AppError;
use keyward_api::state::AppState;
use keyward_api::telemetry::Telemetry;
use keyward_core::event_log::EventLog;
use keyward_event_store::{InMemoryEventLog, PgEventLog, schema};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let telemetry = Telemetry::init(config.otel_endpoint.as_deref())?;

    tracing::info!(?config, "Starting keyward API server");

    let log: Arc<dyn EventLog> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;
            schema::migrate(&pool).await?;
            Arc::new(PgEventLog::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; events are kept in memory only");
            Arc::new(InMemoryEventLog::new())
        }
    };

    let app = keyward_api::build_router(AppState::from_config(&config, log)?);

    let addr = config.bind_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
