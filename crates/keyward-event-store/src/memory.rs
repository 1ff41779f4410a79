//! In-memory implementation of the `EventLog` trait.
//!
//! Used by tests and by the API when no database is configured. The whole
//! append runs under one lock, which gives the same all-or-nothing and
//! per-stream serialization guarantees as the database log.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use keyward_core::aggregate::{ExpectedSequence, PendingAggregate};
use keyward_core::error::DomainError;
use keyward_core::event::StoredEvent;
use keyward_core::event_log::EventLog;
use keyward_core::query::{Ordering, SearchQuery};

/// Event log held in process memory, in commit order.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: Mutex<Vec<StoredEvent>>,
}

impl InMemoryEventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing was committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

fn select(events: &[StoredEvent], query: &SearchQuery) -> Vec<StoredEvent> {
    let limit = query
        .max_results()
        .and_then(|limit| usize::try_from(limit).ok())
        .unwrap_or(usize::MAX);
    let matching = events.iter().filter(|e| query.matches(e));
    match query.ordering() {
        Ordering::Ascending => matching.take(limit).cloned().collect(),
        Ordering::Descending => matching.rev().take(limit).cloned().collect(),
    }
}

fn tip(events: &[StoredEvent], aggregate_type: &str, aggregate_id: &str) -> i64 {
    events
        .iter()
        .rev()
        .find(|e| e.aggregate_type == aggregate_type && e.aggregate_id == aggregate_id)
        .map_or(0, |e| e.sequence)
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(select(&self.events.lock(), query))
    }

    async fn append(
        &self,
        aggregates: Vec<PendingAggregate>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut events = self.events.lock();

        let mut tips: HashMap<(String, String), i64> = HashMap::new();
        for pending in &aggregates {
            let stream = (pending.aggregate_type.clone(), pending.aggregate_id.clone());
            let current = *tips
                .entry(stream)
                .or_insert_with(|| tip(&events, &pending.aggregate_type, &pending.aggregate_id));

            if let ExpectedSequence::Exact(expected) = pending.expected
                && expected != current
            {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_type: pending.aggregate_type.clone(),
                    aggregate_id: pending.aggregate_id.clone(),
                    expected,
                    actual: current,
                });
            }

            if let Some(precondition) = &pending.precondition {
                precondition.check(&select(&events, &precondition.query))?;
            }
        }

        let mut stored = Vec::new();
        for pending in aggregates {
            let sequence = tips
                .entry((pending.aggregate_type.clone(), pending.aggregate_id.clone()))
                .or_insert(0);
            for event in pending.events {
                *sequence += 1;
                stored.push(StoredEvent {
                    event_id: Uuid::new_v4(),
                    aggregate_type: pending.aggregate_type.clone(),
                    aggregate_id: pending.aggregate_id.clone(),
                    aggregate_version: pending.aggregate_version.clone(),
                    sequence: *sequence,
                    event_type: event.event_type,
                    payload: event.payload,
                    editor_id: pending.editor_id.clone(),
                    resource_owner: pending.resource_owner.clone(),
                    correlation_id: pending.correlation_id,
                    created_at: event.created_at,
                });
            }
        }

        events.extend(stored.iter().cloned());
        debug!(events = stored.len(), "Appended events");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use keyward_core::aggregate::AggregateBuilder;
    use keyward_core::command::CommandContext;
    use keyward_core::unique::UniqueConstraint;

    const USERNAMES: UniqueConstraint = UniqueConstraint::new("user.username");

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn ctx() -> CommandContext {
        CommandContext::new("editor", "org-1")
    }

    fn note(id: &str, expected: ExpectedSequence, count: usize) -> PendingAggregate {
        let mut builder = AggregateBuilder::new("note", id, "v1", &ctx()).expect(expected);
        for n in 0..count {
            builder = builder.push_raw("note.added".into(), serde_json::json!({ "n": n }), at());
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_append_assigns_consecutive_sequences() {
        // Arrange
        let log = InMemoryEventLog::new();

        // Act
        log.append(vec![note("n1", ExpectedSequence::Exact(0), 2)])
            .await
            .unwrap();
        let second = log
            .append(vec![note("n1", ExpectedSequence::Exact(2), 1)])
            .await
            .unwrap();

        // Assert
        assert_eq!(second[0].sequence, 3);
        assert_eq!(log.latest_sequence("note", "n1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_stale_expectation_is_a_conflict() {
        let log = InMemoryEventLog::new();
        log.append(vec![note("n1", ExpectedSequence::Exact(0), 2)])
            .await
            .unwrap();

        let result = log
            .append(vec![note("n1", ExpectedSequence::Exact(0), 1)])
            .await;

        match result {
            Err(DomainError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_precondition_commits_nothing() {
        // Arrange
        let log = InMemoryEventLog::new();
        let first = USERNAMES.reserve("alice", "", "u1", &ctx(), at()).unwrap();
        log.append(vec![first]).await.unwrap();

        // Act
        let taken = USERNAMES.reserve("alice", "", "u2", &ctx(), at()).unwrap();
        let result = log
            .append(vec![note("u2", ExpectedSequence::Exact(0), 1), taken])
            .await;

        // Assert
        match result {
            Err(DomainError::AlreadyExists(_)) => {}
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest_sequence("note", "u2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_released_value_can_be_reserved_again() {
        let log = InMemoryEventLog::new();
        log.append(vec![USERNAMES.reserve("alice", "", "u1", &ctx(), at()).unwrap()])
            .await
            .unwrap();
        log.append(vec![USERNAMES.release("alice", "", "u1", &ctx(), at()).unwrap()])
            .await
            .unwrap();

        let result = log
            .append(vec![USERNAMES.reserve("Alice", "", "u2", &ctx(), at()).unwrap()])
            .await
            .unwrap();

        assert_eq!(result[0].sequence, 3);
        assert_eq!(result[0].event_type, "user.username.reserved");
    }

    #[tokio::test]
    async fn test_filter_descending_with_limit_returns_tip() {
        let log = InMemoryEventLog::new();
        log.append(vec![note("n1", ExpectedSequence::Any, 3), note("n2", ExpectedSequence::Any, 1)])
            .await
            .unwrap();

        let tip = log.filter(&SearchQuery::stream_tip("note", "n1")).await.unwrap();
        let all = log.filter(&SearchQuery::new().aggregate_type("note")).await.unwrap();

        assert_eq!(tip.len(), 1);
        assert_eq!(tip[0].sequence, 3);
        assert_eq!(all.len(), 4);
        assert_eq!(all.last().unwrap().aggregate_id, "n2");
    }
}
