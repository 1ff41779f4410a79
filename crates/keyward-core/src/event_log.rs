//! Event log port.

use async_trait::async_trait;

use crate::aggregate::PendingAggregate;
use crate::error::DomainError;
use crate::event::StoredEvent;
use crate::query::SearchQuery;

/// Append-only, multi-stream event log.
///
/// `append` is all-or-nothing across every pending aggregate it receives:
/// tail expectations are checked, preconditions evaluated and sequences
/// assigned inside one atomic commit. Appends touching the same stream are
/// serialized.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Returns the events matching `query`.
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>, DomainError>;

    /// Atomically appends the pending aggregates and returns the stored
    /// events in commit order.
    async fn append(
        &self,
        aggregates: Vec<PendingAggregate>,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Returns the latest sequence of a stream, or 0 if it has no events.
    async fn latest_sequence(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<i64, DomainError> {
        let tip = self
            .filter(&SearchQuery::stream_tip(aggregate_type, aggregate_id))
            .await?;
        Ok(tip.first().map_or(0, |e| e.sequence))
    }
}
