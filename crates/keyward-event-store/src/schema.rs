//! Event store database schema.

use keyward_core::error::DomainError;
use sqlx::PgPool;
use sqlx::migrate::Migrator;

/// Embedded migrations creating the `events` table.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Columns selected for every event read, in `EventRow` order.
pub(crate) const EVENT_COLUMNS: &str = "event_id, aggregate_type, aggregate_id, aggregate_version, \
     sequence, event_type, payload, editor_id, resource_owner, correlation_id, created_at";

/// Applies pending migrations.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), DomainError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("migration failed: {e}")))
}
