//! User identity bounded context.
//!
//! Human and machine users, their credentials, verification codes and
//! TOTP enrollment, persisted as events with username and email uniqueness
//! enforced through reservation streams.

pub mod application;
pub mod domain;
