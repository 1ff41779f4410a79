//! Application layer: command and query handlers.

pub mod command_handlers;
pub mod query_handlers;
pub mod services;

#[cfg(test)]
mod test_harness;
