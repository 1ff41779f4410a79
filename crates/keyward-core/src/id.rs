//! Identifier generation for new aggregates.

use uuid::Uuid;

/// Source of identifiers for newly created aggregates.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh, unique identifier.
    fn next_id(&self) -> String;
}

/// Production generator producing time-ordered UUIDv7 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }
}
