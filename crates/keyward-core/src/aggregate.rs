//! Aggregate roots and the pending-aggregate builder.
//!
//! An [`AggregateRoot`] is a snapshot folded from its stream. Commands never
//! mutate a snapshot directly: they describe the events to append through an
//! [`AggregateBuilder`], which produces a [`PendingAggregate`] for the log.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::command::CommandContext;
use crate::error::DomainError;
use crate::event::{Event, EventKind, StoredEvent};
use crate::query::SearchQuery;

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Clone + Send + Sync {
    /// The event payloads this aggregate produces and consumes.
    type Event: EventKind;

    /// Aggregate type name of the stream, e.g. `user`.
    const AGGREGATE_TYPE: &'static str;

    /// Schema-compatibility tag written with every event.
    const AGGREGATE_VERSION: &'static str;

    /// Zero-value snapshot for a stream that has no events yet.
    fn new(aggregate_id: &str) -> Self;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &str;

    /// Returns the sequence of the last applied event (0 when empty).
    fn sequence(&self) -> i64;

    /// Returns the tenant owning the stream (empty when empty).
    fn resource_owner(&self) -> &str;

    /// Apply an event to mutate internal state.
    ///
    /// Implementations must advance [`AggregateRoot::sequence`] to the
    /// event's sequence.
    fn apply(&mut self, event: &Event<Self::Event>);
}

/// Folds stored events onto `aggregate` in order. Events at or below the
/// snapshot's sequence are skipped, so folding is idempotent.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn fold<A: AggregateRoot>(aggregate: &mut A, events: &[StoredEvent]) -> Result<(), DomainError> {
    for stored in events {
        if stored.sequence <= aggregate.sequence() {
            continue;
        }
        let event = Event::<A::Event>::from_stored(stored)?;
        aggregate.apply(&event);
    }
    Ok(())
}

/// Reconstitutes an aggregate from its full stream.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn reconstitute<A: AggregateRoot>(
    aggregate_id: &str,
    events: &[StoredEvent],
) -> Result<A, DomainError> {
    let mut aggregate = A::new(aggregate_id);
    fold(&mut aggregate, events)?;
    Ok(aggregate)
}

/// An event waiting to be appended. The log assigns id and sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    /// Namespaced event type.
    pub event_type: String,
    /// Serialized payload.
    pub payload: serde_json::Value,
    /// Creation timestamp, taken from the command's clock.
    pub created_at: DateTime<Utc>,
}

/// The optimistic-concurrency expectation on a stream's tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedSequence {
    /// The stream's latest sequence must equal this value (0 = empty stream).
    Exact(i64),
    /// No tail check; correctness comes from the precondition instead.
    Any,
}

/// Validation run against the result of a precondition query.
pub type Validation = Arc<dyn Fn(&[StoredEvent]) -> Result<(), DomainError> + Send + Sync>;

/// A query plus a validation that must pass against the live log
/// immediately before the pending events are committed.
#[derive(Clone)]
pub struct Precondition {
    /// Query evaluated inside the commit.
    pub query: SearchQuery,
    validate: Validation,
}

impl Precondition {
    /// Creates a precondition.
    pub fn new<F>(query: SearchQuery, validate: F) -> Self
    where
        F: Fn(&[StoredEvent]) -> Result<(), DomainError> + Send + Sync + 'static,
    {
        Self {
            query,
            validate: Arc::new(validate),
        }
    }

    /// Runs the validation against the query result.
    ///
    /// # Errors
    ///
    /// Returns whatever error the validation produces.
    pub fn check(&self, events: &[StoredEvent]) -> Result<(), DomainError> {
        (self.validate)(events)
    }
}

impl fmt::Debug for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Precondition")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Events for one stream that must be appended together with the other
/// pending aggregates of the same command.
#[derive(Debug, Clone)]
pub struct PendingAggregate {
    /// Aggregate type of the stream.
    pub aggregate_type: String,
    /// Aggregate/stream identifier.
    pub aggregate_id: String,
    /// Schema-compatibility tag.
    pub aggregate_version: String,
    /// Tenant the events are written under.
    pub resource_owner: String,
    /// Editor recorded on every event.
    pub editor_id: String,
    /// Correlation ID recorded on every event.
    pub correlation_id: Uuid,
    /// Tail expectation.
    pub expected: ExpectedSequence,
    /// Ordered events to append.
    pub events: Vec<PendingEvent>,
    /// Optional commit-time precondition.
    pub precondition: Option<Precondition>,
}

impl PendingAggregate {
    /// Returns `true` if this pending aggregate targets the given stream.
    #[must_use]
    pub fn is_stream(&self, aggregate_type: &str, aggregate_id: &str) -> bool {
        self.aggregate_type == aggregate_type && self.aggregate_id == aggregate_id
    }
}

/// Pure, stateless construction of a [`PendingAggregate`].
#[derive(Debug)]
pub struct AggregateBuilder {
    pending: PendingAggregate,
}

impl AggregateBuilder {
    /// Starts a builder for an arbitrary stream with no tail expectation.
    #[must_use]
    pub fn new(
        aggregate_type: &str,
        aggregate_id: &str,
        aggregate_version: &str,
        ctx: &CommandContext,
    ) -> Self {
        Self {
            pending: PendingAggregate {
                aggregate_type: aggregate_type.to_owned(),
                aggregate_id: aggregate_id.to_owned(),
                aggregate_version: aggregate_version.to_owned(),
                resource_owner: ctx.resource_owner.clone(),
                editor_id: ctx.editor_id.clone(),
                correlation_id: ctx.correlation_id,
                expected: ExpectedSequence::Any,
                events: Vec::new(),
                precondition: None,
            },
        }
    }

    /// Starts a builder for a brand-new stream of `A`; the commit fails if
    /// the stream already has events.
    #[must_use]
    pub fn create<A: AggregateRoot>(aggregate_id: &str, ctx: &CommandContext) -> Self {
        Self::new(A::AGGREGATE_TYPE, aggregate_id, A::AGGREGATE_VERSION, ctx)
            .expect(ExpectedSequence::Exact(0))
    }

    /// Starts a builder on top of a loaded snapshot; the commit fails if the
    /// stream moved past the snapshot's sequence.
    #[must_use]
    pub fn for_snapshot<A: AggregateRoot>(snapshot: &A, ctx: &CommandContext) -> Self {
        let mut builder = Self::new(
            A::AGGREGATE_TYPE,
            snapshot.aggregate_id(),
            A::AGGREGATE_VERSION,
            ctx,
        )
        .expect(ExpectedSequence::Exact(snapshot.sequence()));
        if !snapshot.resource_owner().is_empty() {
            builder.pending.resource_owner = snapshot.resource_owner().to_owned();
        }
        builder
    }

    /// Overrides the tenant the events are written under.
    #[must_use]
    pub fn resource_owner(mut self, resource_owner: &str) -> Self {
        resource_owner.clone_into(&mut self.pending.resource_owner);
        self
    }

    /// Sets the tail expectation.
    #[must_use]
    pub fn expect(mut self, expected: ExpectedSequence) -> Self {
        self.pending.expected = expected;
        self
    }

    /// Appends a typed event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload does not serialize.
    pub fn push<K: EventKind>(self, kind: &K, at: DateTime<Utc>) -> Result<Self, DomainError> {
        let payload = kind.to_payload()?;
        Ok(self.push_raw(kind.event_type().to_owned(), payload, at))
    }

    /// Appends an event with an already serialized payload.
    #[must_use]
    pub fn push_raw(mut self, event_type: String, payload: serde_json::Value, at: DateTime<Utc>) -> Self {
        self.pending.events.push(PendingEvent {
            event_type,
            payload,
            created_at: at,
        });
        self
    }

    /// Attaches a commit-time precondition.
    #[must_use]
    pub fn precondition(mut self, precondition: Precondition) -> Self {
        self.pending.precondition = Some(precondition);
        self
    }

    /// Number of events pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.events.len()
    }

    /// Returns `true` if no events were pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.events.is_empty()
    }

    /// Finishes the pending aggregate.
    #[must_use]
    pub fn build(self) -> PendingAggregate {
        self.pending
    }
}
