//! Shared test doubles and utilities for the keyward identity backend.

mod clock;
mod crypto;
mod event_log;
mod id;

pub use clock::{FixedClock, ManualClock};
pub use crypto::{InsecureHasher, PlainCodeGenerator, StaticOtpProvider};
pub use event_log::{EmptyEventLog, FailingEventLog, RecordingEventLog};
pub use id::SequenceIdGenerator;
