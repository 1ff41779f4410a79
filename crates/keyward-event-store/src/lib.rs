//! Event log implementations for keyward.

pub mod memory;
pub mod pg_event_log;
pub mod schema;

pub use memory::InMemoryEventLog;
pub use pg_event_log::PgEventLog;
