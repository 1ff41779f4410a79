//! `PostgreSQL` implementation of the `EventLog` trait.
//!
//! Appends run in one transaction. Every touched stream is serialized with a
//! transaction-scoped advisory lock taken in a stable order, after which
//! tail expectations and preconditions are evaluated against the live table
//! and the events are inserted with freshly assigned sequences.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use keyward_core::aggregate::{ExpectedSequence, PendingAggregate};
use keyward_core::error::DomainError;
use keyward_core::event::StoredEvent;
use keyward_core::event_log::EventLog;
use keyward_core::query::{Ordering, SearchQuery};

use crate::schema::EVENT_COLUMNS;

/// PostgreSQL-backed event log.
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    /// Creates a new `PgEventLog`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_type: String,
    aggregate_id: String,
    aggregate_version: String,
    sequence: i64,
    event_type: String,
    payload: serde_json::Value,
    editor_id: String,
    resource_owner: String,
    correlation_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            aggregate_version: row.aggregate_version,
            sequence: row.sequence,
            event_type: row.event_type,
            payload: row.payload,
            editor_id: row.editor_id,
            resource_owner: row.resource_owner,
            correlation_id: row.correlation_id,
            created_at: row.created_at,
        }
    }
}

fn db_error(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {e}"))
}

/// Advisory lock key of a stream.
fn lock_key(aggregate_type: &str, aggregate_id: &str) -> i64 {
    let digest = Sha256::new()
        .chain_update(aggregate_type.as_bytes())
        .chain_update([0u8])
        .chain_update(aggregate_id.as_bytes())
        .finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(head)
}

fn select_events(query: &SearchQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));
    if let Some(aggregate_type) = query.aggregate_type_filter() {
        builder
            .push(" AND aggregate_type = ")
            .push_bind(aggregate_type.to_owned());
    }
    if !query.aggregate_ids().is_empty() {
        builder
            .push(" AND aggregate_id = ANY(")
            .push_bind(query.aggregate_ids().to_vec())
            .push(")");
    }
    if let Some(prefix) = query.event_type_prefix_filter() {
        builder
            .push(" AND starts_with(event_type, ")
            .push_bind(prefix.to_owned())
            .push(")");
    }
    if let Some(owner) = query.resource_owner_filter() {
        builder.push(" AND resource_owner = ").push_bind(owner.to_owned());
    }
    if let Some(min) = query.min_sequence() {
        builder.push(" AND sequence > ").push_bind(min);
    }
    builder.push(match query.ordering() {
        Ordering::Ascending => " ORDER BY position ASC",
        Ordering::Descending => " ORDER BY position DESC",
    });
    if let Some(limit) = query.max_results() {
        builder
            .push(" LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    builder
}

async fn fetch_events<'e, E>(executor: E, query: &SearchQuery) -> Result<Vec<StoredEvent>, DomainError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let mut builder = select_events(query);
    let rows: Vec<EventRow> = builder
        .build_query_as()
        .fetch_all(executor)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().map(StoredEvent::from).collect())
}

#[async_trait]
impl EventLog for PgEventLog {
    #[instrument(skip(self, query))]
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, DomainError> {
        fetch_events(&self.pool, query).await
    }

    #[instrument(skip(self, aggregates), fields(streams = aggregates.len()))]
    async fn append(
        &self,
        aggregates: Vec<PendingAggregate>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        if aggregates.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let mut keys: Vec<i64> = aggregates
            .iter()
            .map(|a| lock_key(&a.aggregate_type, &a.aggregate_id))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        for key in keys {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        let mut tips: HashMap<(String, String), i64> = HashMap::new();
        for pending in &aggregates {
            let stream = (pending.aggregate_type.clone(), pending.aggregate_id.clone());
            let current = match tips.get(&stream) {
                Some(sequence) => *sequence,
                None => {
                    let sequence: i64 = sqlx::query_scalar(
                        "SELECT COALESCE(MAX(sequence), 0) FROM events \
                         WHERE aggregate_type = $1 AND aggregate_id = $2",
                    )
                    .bind(&pending.aggregate_type)
                    .bind(&pending.aggregate_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_error)?;
                    tips.insert(stream, sequence);
                    sequence
                }
            };

            if let ExpectedSequence::Exact(expected) = pending.expected
                && expected != current
            {
                warn!(
                    aggregate_type = %pending.aggregate_type,
                    aggregate_id = %pending.aggregate_id,
                    expected,
                    actual = current,
                    "Stream moved past expected sequence"
                );
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_type: pending.aggregate_type.clone(),
                    aggregate_id: pending.aggregate_id.clone(),
                    expected,
                    actual: current,
                });
            }

            if let Some(precondition) = &pending.precondition {
                let events = fetch_events(&mut *tx, &precondition.query).await?;
                precondition.check(&events)?;
            }
        }

        let mut stored = Vec::new();
        for pending in aggregates {
            let stream = (pending.aggregate_type.clone(), pending.aggregate_id.clone());
            let mut sequence = tips.get(&stream).copied().unwrap_or(0);
            for event in pending.events {
                sequence += 1;
                let record = StoredEvent {
                    event_id: Uuid::new_v4(),
                    aggregate_type: pending.aggregate_type.clone(),
                    aggregate_id: pending.aggregate_id.clone(),
                    aggregate_version: pending.aggregate_version.clone(),
                    sequence,
                    event_type: event.event_type,
                    payload: event.payload,
                    editor_id: pending.editor_id.clone(),
                    resource_owner: pending.resource_owner.clone(),
                    correlation_id: pending.correlation_id,
                    created_at: event.created_at,
                };
                sqlx::query(
                    "INSERT INTO events (event_id, aggregate_type, aggregate_id, aggregate_version, \
                     sequence, event_type, payload, editor_id, resource_owner, correlation_id, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                )
                .bind(record.event_id)
                .bind(&record.aggregate_type)
                .bind(&record.aggregate_id)
                .bind(&record.aggregate_version)
                .bind(record.sequence)
                .bind(&record.event_type)
                .bind(&record.payload)
                .bind(&record.editor_id)
                .bind(&record.resource_owner)
                .bind(record.correlation_id)
                .bind(record.created_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(db) = &e
                        && db.is_unique_violation()
                    {
                        return DomainError::ConcurrencyConflict {
                            aggregate_type: record.aggregate_type.clone(),
                            aggregate_id: record.aggregate_id.clone(),
                            expected: sequence - 1,
                            actual: sequence,
                        };
                    }
                    db_error(e)
                })?;
                stored.push(record);
            }
            tips.insert(stream, sequence);
        }

        tx.commit().await.map_err(db_error)?;
        debug!(events = stored.len(), "Appended events");
        Ok(stored)
    }
}
