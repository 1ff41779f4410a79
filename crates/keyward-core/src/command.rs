//! Command abstractions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::event::StoredEvent;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;
}

/// Who issues a command, on behalf of which tenant, and under which
/// correlation ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    /// Correlation ID to trace this command through the system.
    pub correlation_id: Uuid,
    /// The user or system issuing the command.
    pub editor_id: String,
    /// Tenant the command runs in.
    pub resource_owner: String,
}

impl CommandContext {
    /// Creates a context with a fresh correlation ID.
    #[must_use]
    pub fn new(editor_id: &str, resource_owner: &str) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            editor_id: editor_id.to_owned(),
            resource_owner: resource_owner.to_owned(),
        }
    }

    /// Replaces the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// What a successful command reports back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDetails {
    /// Sequence of the last event appended to the primary stream.
    pub sequence: i64,
    /// Tenant owning the primary stream.
    pub resource_owner: String,
    /// Creation time of that event.
    pub event_date: DateTime<Utc>,
}

impl ObjectDetails {
    /// Details of the last committed event belonging to the given stream.
    #[must_use]
    pub fn from_events(
        events: &[StoredEvent],
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Option<Self> {
        events
            .iter()
            .rev()
            .find(|e| e.aggregate_type == aggregate_type && e.aggregate_id == aggregate_id)
            .map(|e| Self {
                sequence: e.sequence,
                resource_owner: e.resource_owner.clone(),
                event_date: e.created_at,
            })
    }
}
