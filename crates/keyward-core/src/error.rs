//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Every command and query returns one of these kinds; the transport layer
/// maps each kind to a stable error identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// An aggregate stream has no events (or was removed).
    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),

    /// A sub-resource of an existing aggregate (code, OTP, phone, ...) is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state, uniqueness or "no changes" rule was violated.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Wrong password or code, expired code, or malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A unique value is already reserved, or a resource is already set up.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic concurrency conflict on a stream tail.
    #[error(
        "concurrency conflict on {aggregate_type} {aggregate_id}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate type of the conflicting stream.
        aggregate_type: String,
        /// The aggregate that had the conflict.
        aggregate_id: String,
        /// The sequence the command was built against.
        expected: i64,
        /// The sequence found in the log at commit time.
        actual: i64,
    },

    /// An infrastructure/persistence error. Safe to retry.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors a caller may retry without re-evaluating
    /// business rules.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }

    /// Returns `true` if a retry from a fresh snapshot could succeed.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_infrastructure_errors_are_transient() {
        assert!(DomainError::Infrastructure("db down".into()).is_transient());
        assert!(!DomainError::PreconditionFailed("locked".into()).is_transient());
        assert!(!DomainError::AlreadyExists("alice".into()).is_transient());
    }

    #[test]
    fn test_concurrency_conflict_message_names_stream() {
        let err = DomainError::ConcurrencyConflict {
            aggregate_type: "user".into(),
            aggregate_id: "u1".into(),
            expected: 3,
            actual: 4,
        };

        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "concurrency conflict on user u1: expected sequence 3, found 4"
        );
    }
}
