//! Shared foundations for the Reach SDK — error types, configuration,
//! clock abstraction, and event-name validation.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SdkConfig;
pub use error::{ReachError, ReachResult};
