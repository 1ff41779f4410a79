//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// An event as persisted in the log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate type of the stream this event belongs to.
    pub aggregate_type: String,
    /// Aggregate/stream identifier.
    pub aggregate_id: String,
    /// Schema-compatibility tag of the aggregate (e.g. `v1`).
    pub aggregate_version: String,
    /// Per-stream sequence assigned by the log at commit time.
    pub sequence: i64,
    /// Namespaced event type name, e.g. `user.human.added`.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// The user or system that issued the command.
    pub editor_id: String,
    /// Tenant that owns the stream.
    pub resource_owner: String,
    /// Correlation ID of the command that produced the event.
    pub correlation_id: Uuid,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
}

/// Metadata attached to every typed domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name for deserialization routing.
    pub event_type: String,
    /// Aggregate/stream this event belongs to.
    pub aggregate_id: String,
    /// Sequence within the aggregate stream.
    pub sequence: i64,
    /// Editor that caused the event.
    pub editor_id: String,
    /// Tenant that owns the stream.
    pub resource_owner: String,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
}

impl From<&StoredEvent> for EventMetadata {
    fn from(stored: &StoredEvent) -> Self {
        Self {
            event_id: stored.event_id,
            event_type: stored.event_type.clone(),
            aggregate_id: stored.aggregate_id.clone(),
            sequence: stored.sequence,
            editor_id: stored.editor_id.clone(),
            resource_owner: stored.resource_owner.clone(),
            correlation_id: stored.correlation_id,
            created_at: stored.created_at,
        }
    }
}

/// Closed set of event payloads for one aggregate type.
///
/// Implemented by a serializable enum; each variant maps to exactly one
/// namespaced event type string.
pub trait EventKind: Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send + Sync {
    /// Returns the event type name (used for serialization routing and queries).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization fails.
    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(self)
            .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))
    }
}

/// Typed domain event envelope.
#[derive(Debug, Clone)]
pub struct Event<K> {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: K,
}

impl<K: EventKind> Event<K> {
    /// Rebuilds a typed event from its stored form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload does not decode.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let kind: K = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!(
                "event deserialization failed for {} (sequence {}): {e}",
                stored.event_type, stored.sequence
            ))
        })?;
        Ok(Self {
            metadata: EventMetadata::from(stored),
            kind,
        })
    }
}

/// Builds a namespaced event type, e.g. `("user.username", "reserved")`
/// gives `user.username.reserved`.
#[must_use]
pub fn event_type_in(namespace: &str, name: &str) -> String {
    format!("{namespace}.{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    enum TestKind {
        Opened { label: String },
        Closed,
    }

    impl EventKind for TestKind {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Opened { .. } => "test.opened",
                Self::Closed => "test.closed",
            }
        }
    }

    fn stored(payload: serde_json::Value) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_type: "test".into(),
            aggregate_id: "t1".into(),
            aggregate_version: "v1".into(),
            sequence: 7,
            event_type: "test.opened".into(),
            payload,
            editor_id: "editor".into(),
            resource_owner: "org".into(),
            correlation_id: Uuid::new_v4(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_from_stored_decodes_payload_and_copies_metadata() {
        // Arrange
        let kind = TestKind::Opened {
            label: "door".into(),
        };
        let stored = stored(kind.to_payload().unwrap());

        // Act
        let event = Event::<TestKind>::from_stored(&stored).unwrap();

        // Assert
        assert_eq!(event.kind, kind);
        assert_eq!(event.metadata.sequence, 7);
        assert_eq!(event.metadata.aggregate_id, "t1");
        assert_eq!(event.metadata.resource_owner, "org");
    }

    #[test]
    fn test_from_stored_rejects_foreign_payload() {
        let stored = stored(serde_json::json!({"Unknown": {}}));

        let result = Event::<TestKind>::from_stored(&stored);

        match result {
            Err(DomainError::Infrastructure(msg)) => assert!(msg.contains("sequence 7")),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[test]
    fn test_event_type_in_joins_namespace_and_name() {
        assert_eq!(
            event_type_in("user.email", "released"),
            "user.email.released"
        );
    }
}
