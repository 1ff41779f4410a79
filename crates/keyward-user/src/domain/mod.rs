//! Domain layer: the user aggregate, its events, commands and policies.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod policy;
