//! # Built-in subscribers
//!
//! - [`LogWriter`]: forwards every event to `tracing` with structured fields.
//! - [`Counters`]: in-process counters and a queue-depth gauge.

mod counters;
mod log;

pub use counters::{Counters, CountersSnapshot};
pub use log::LogWriter;
