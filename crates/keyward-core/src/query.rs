//! Search queries over the event log.

use crate::event::StoredEvent;

/// Result ordering of a [`SearchQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ordering {
    /// Oldest first (commit order).
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// Filter over the event log.
///
/// All set filters must match. Results are ordered by commit position,
/// which within a single stream equals sequence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    aggregate_type: Option<String>,
    aggregate_ids: Vec<String>,
    event_type_prefix: Option<String>,
    resource_owner: Option<String>,
    sequence_greater_than: Option<i64>,
    ordering: Ordering,
    limit: Option<u64>,
}

impl SearchQuery {
    /// Creates an empty query matching every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Query for one stream, events after `sequence` (exclusive).
    #[must_use]
    pub fn stream_after(aggregate_type: &str, aggregate_id: &str, sequence: i64) -> Self {
        Self::new()
            .aggregate_type(aggregate_type)
            .aggregate_id(aggregate_id)
            .sequence_greater_than(sequence)
    }

    /// Query for the single latest event of one stream.
    #[must_use]
    pub fn stream_tip(aggregate_type: &str, aggregate_id: &str) -> Self {
        Self::new()
            .aggregate_type(aggregate_type)
            .aggregate_id(aggregate_id)
            .order_desc()
            .limit(1)
    }

    /// Restricts to one aggregate type.
    #[must_use]
    pub fn aggregate_type(mut self, aggregate_type: &str) -> Self {
        self.aggregate_type = Some(aggregate_type.to_owned());
        self
    }

    /// Adds an aggregate id; several ids are OR-ed.
    #[must_use]
    pub fn aggregate_id(mut self, aggregate_id: &str) -> Self {
        self.aggregate_ids.push(aggregate_id.to_owned());
        self
    }

    /// Restricts to event types starting with `prefix`.
    #[must_use]
    pub fn event_type_prefix(mut self, prefix: &str) -> Self {
        self.event_type_prefix = Some(prefix.to_owned());
        self
    }

    /// Restricts to one tenant.
    #[must_use]
    pub fn resource_owner(mut self, resource_owner: &str) -> Self {
        self.resource_owner = Some(resource_owner.to_owned());
        self
    }

    /// Only events with `sequence > sequence`. Zero is a no-op.
    #[must_use]
    pub fn sequence_greater_than(mut self, sequence: i64) -> Self {
        self.sequence_greater_than = (sequence > 0).then_some(sequence);
        self
    }

    /// Newest first.
    #[must_use]
    pub fn order_desc(mut self) -> Self {
        self.ordering = Ordering::Descending;
        self
    }

    /// Oldest first.
    #[must_use]
    pub fn order_asc(mut self) -> Self {
        self.ordering = Ordering::Ascending;
        self
    }

    /// Caps the number of returned events. Zero means unlimited.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// The aggregate type filter, if any.
    #[must_use]
    pub fn aggregate_type_filter(&self) -> Option<&str> {
        self.aggregate_type.as_deref()
    }

    /// The aggregate id filter (empty means any).
    #[must_use]
    pub fn aggregate_ids(&self) -> &[String] {
        &self.aggregate_ids
    }

    /// The event type prefix filter, if any.
    #[must_use]
    pub fn event_type_prefix_filter(&self) -> Option<&str> {
        self.event_type_prefix.as_deref()
    }

    /// The resource owner filter, if any.
    #[must_use]
    pub fn resource_owner_filter(&self) -> Option<&str> {
        self.resource_owner.as_deref()
    }

    /// The exclusive lower sequence bound, if any.
    #[must_use]
    pub fn min_sequence(&self) -> Option<i64> {
        self.sequence_greater_than
    }

    /// The requested ordering.
    #[must_use]
    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    /// The row limit, if any.
    #[must_use]
    pub fn max_results(&self) -> Option<u64> {
        self.limit
    }

    /// Evaluates every filter except ordering and limit against `event`.
    #[must_use]
    pub fn matches(&self, event: &StoredEvent) -> bool {
        if let Some(aggregate_type) = &self.aggregate_type {
            if &event.aggregate_type != aggregate_type {
                return false;
            }
        }
        if !self.aggregate_ids.is_empty() && !self.aggregate_ids.contains(&event.aggregate_id) {
            return false;
        }
        if let Some(prefix) = &self.event_type_prefix {
            if !event.event_type.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(owner) = &self.resource_owner {
            if &event.resource_owner != owner {
                return false;
            }
        }
        if let Some(min) = self.sequence_greater_than {
            if event.sequence <= min {
                return false;
            }
        }
        true
    }
}
