//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait (the metrics/observability sink of
//! the runtime), the [`SubscriberSet`] fan-out, and two built-in subscribers.
//!
//! ## Architecture
//! ```text
//! Worker / Source / Gate ── publish(Event) ──► Bus ──► controller listener
//!                                                          │
//!                                                   SubscriberSet::emit
//!                                                          │
//!                                         ┌────────────────┼─────────────┐
//!                                         ▼                ▼             ▼
//!                                     LogWriter        Counters       custom
//!                                    (tracing)     (atomic counters)
//! ```

mod embedded;
mod set;
mod subscribe;

pub use embedded::{Counters, CountersSnapshot, LogWriter};
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
