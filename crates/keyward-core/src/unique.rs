//! Unique-value reservation.
//!
//! A unique value (username, email) is its own tiny stream whose id is the
//! normalized value. Its tip is either `reserved` or `released`; a commit
//! time precondition over that tip emulates a unique index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateBuilder, PendingAggregate, Precondition};
use crate::command::CommandContext;
use crate::error::DomainError;
use crate::event::{StoredEvent, event_type_in};
use crate::query::SearchQuery;

const RESERVED: &str = "reserved";
const RELEASED: &str = "released";
const VERSION: &str = "v1";

/// Payload of reservation events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueValuePayload {
    /// Normalized protected value.
    pub value: String,
    /// Aggregate holding (or giving up) the value.
    pub owner_id: String,
}

/// A namespace of unique values, e.g. `user.username`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueConstraint {
    namespace: &'static str,
}

impl UniqueConstraint {
    /// Creates a constraint over `namespace`, which doubles as the
    /// aggregate type of its streams.
    #[must_use]
    pub const fn new(namespace: &'static str) -> Self {
        Self { namespace }
    }

    /// The namespace / aggregate type.
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Event type written on reservation.
    #[must_use]
    pub fn reserved_event_type(&self) -> String {
        event_type_in(self.namespace, RESERVED)
    }

    /// Event type written on release.
    #[must_use]
    pub fn released_event_type(&self) -> String {
        event_type_in(self.namespace, RELEASED)
    }

    /// Stream id for `value`, salted with `scope` when non-empty.
    #[must_use]
    pub fn stream_id(value: &str, scope: &str) -> String {
        let normalized = normalize(value);
        if scope.is_empty() {
            normalized
        } else {
            format!("{scope}:{normalized}")
        }
    }

    /// Builds a pending reservation of `value`.
    ///
    /// The precondition fails with `AlreadyExists` if the stream's tip is
    /// already a reservation. Scoped reservations are written under the
    /// scope as resource owner.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a blank value.
    pub fn reserve(
        &self,
        value: &str,
        scope: &str,
        owner_id: &str,
        ctx: &CommandContext,
        at: DateTime<Utc>,
    ) -> Result<PendingAggregate, DomainError> {
        let reserved = self.reserved_event_type();
        let tip_type = reserved.clone();
        let label = format!("{} {}", self.namespace, value.trim());
        self.build(value, scope, owner_id, ctx, at, &reserved, move |tip| {
            match tip.first() {
                Some(latest) if latest.event_type == tip_type => {
                    Err(DomainError::AlreadyExists(format!("{label} is already taken")))
                }
                _ => Ok(()),
            }
        })
    }

    /// Builds a pending release of `value`.
    ///
    /// The precondition fails with `PreconditionFailed` if the stream's tip
    /// is already a release.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a blank value.
    pub fn release(
        &self,
        value: &str,
        scope: &str,
        owner_id: &str,
        ctx: &CommandContext,
        at: DateTime<Utc>,
    ) -> Result<PendingAggregate, DomainError> {
        let released = self.released_event_type();
        let tip_type = released.clone();
        let label = format!("{} {}", self.namespace, value.trim());
        self.build(value, scope, owner_id, ctx, at, &released, move |tip| {
            match tip.first() {
                Some(latest) if latest.event_type == tip_type => Err(
                    DomainError::PreconditionFailed(format!("{label} is not reserved")),
                ),
                _ => Ok(()),
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build<F>(
        &self,
        value: &str,
        scope: &str,
        owner_id: &str,
        ctx: &CommandContext,
        at: DateTime<Utc>,
        event_type: &str,
        validate: F,
    ) -> Result<PendingAggregate, DomainError>
    where
        F: Fn(&[StoredEvent]) -> Result<(), DomainError> + Send + Sync + 'static,
    {
        if value.trim().is_empty() {
            return Err(DomainError::InvalidArgument(format!(
                "{} must not be empty",
                self.namespace
            )));
        }
        let stream_id = Self::stream_id(value, scope);
        let payload = serde_json::to_value(UniqueValuePayload {
            value: normalize(value),
            owner_id: owner_id.to_owned(),
        })
        .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))?;

        let mut builder = AggregateBuilder::new(self.namespace, &stream_id, VERSION, ctx)
            .precondition(Precondition::new(
                SearchQuery::stream_tip(self.namespace, &stream_id),
                validate,
            ))
            .push_raw(event_type.to_owned(), payload, at);
        if !scope.is_empty() {
            builder = builder.resource_owner(scope);
        }
        Ok(builder.build())
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
