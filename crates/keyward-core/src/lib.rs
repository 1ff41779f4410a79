//! Shared event-sourcing abstractions.
//!
//! This crate defines the event log contract, the aggregate builder and
//! precondition protocol, unique-value reservation and the read-through
//! cache that every bounded context depends on. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod command;
pub mod crypto;
pub mod error;
pub mod event;
pub mod event_log;
pub mod id;
pub mod query;
pub mod unique;
