//! Mock `EventLog` implementations for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use keyward_core::aggregate::PendingAggregate;
use keyward_core::error::DomainError;
use keyward_core::event::StoredEvent;
use keyward_core::event_log::EventLog;
use keyward_core::query::SearchQuery;
use parking_lot::Mutex;
use uuid::Uuid;

/// Turns pending aggregates into stored events, numbering each stream from
/// `tips` (0 when absent). Expectations and preconditions are ignored.
fn store(aggregates: &[PendingAggregate], tips: &HashMap<(String, String), i64>) -> Vec<StoredEvent> {
    let mut sequences = tips.clone();
    let mut stored = Vec::new();
    for pending in aggregates {
        let sequence = sequences
            .entry((pending.aggregate_type.clone(), pending.aggregate_id.clone()))
            .or_insert(0);
        for event in &pending.events {
            *sequence += 1;
            stored.push(StoredEvent {
                event_id: Uuid::new_v4(),
                aggregate_type: pending.aggregate_type.clone(),
                aggregate_id: pending.aggregate_id.clone(),
                aggregate_version: pending.aggregate_version.clone(),
                sequence: *sequence,
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
                editor_id: pending.editor_id.clone(),
                resource_owner: pending.resource_owner.clone(),
                correlation_id: pending.correlation_id,
                created_at: event.created_at,
            });
        }
    }
    stored
}

/// An event log that answers every `filter` from a fixed event list and
/// records every `append` without checking expectations or preconditions.
#[derive(Debug)]
pub struct RecordingEventLog {
    events: Vec<StoredEvent>,
    appended: Mutex<Vec<PendingAggregate>>,
}

impl RecordingEventLog {
    /// Creates a log serving `events`.
    #[must_use]
    pub fn new(events: Vec<StoredEvent>) -> Self {
        Self {
            events,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all pending aggregates that were appended.
    pub fn appended(&self) -> Vec<PendingAggregate> {
        self.appended.lock().clone()
    }

    /// Event types appended so far, in order.
    pub fn appended_event_types(&self) -> Vec<String> {
        self.appended
            .lock()
            .iter()
            .flat_map(|pending| pending.events.iter().map(|e| e.event_type.clone()))
            .collect()
    }
}

#[async_trait]
impl EventLog for RecordingEventLog {
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .events
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }

    async fn append(
        &self,
        aggregates: Vec<PendingAggregate>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut tips = HashMap::new();
        for event in &self.events {
            tips.insert(
                (event.aggregate_type.clone(), event.aggregate_id.clone()),
                event.sequence,
            );
        }
        let stored = store(&aggregates, &tips);
        self.appended.lock().extend(aggregates);
        Ok(stored)
    }
}

/// An event log with no events that silently accepts appends. Useful for
/// testing "aggregate not found" scenarios and creation commands.
#[derive(Debug)]
pub struct EmptyEventLog;

#[async_trait]
impl EventLog for EmptyEventLog {
    async fn filter(&self, _query: &SearchQuery) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append(
        &self,
        aggregates: Vec<PendingAggregate>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(store(&aggregates, &HashMap::new()))
    }
}

/// An event log that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventLog;

#[async_trait]
impl EventLog for FailingEventLog {
    async fn filter(&self, _query: &SearchQuery) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append(
        &self,
        _aggregates: Vec<PendingAggregate>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
