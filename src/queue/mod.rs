//! Work queue: the single synchronization point between producers (event source,
//! resync) and consumers (workers).
//!
//! ## Contents
//! - [`WorkQueue`] deduplicating key set with readiness order, in-flight tracking and retry backoff
//! - [`Lease`] RAII claim on an in-flight key; dropping it calls `done`
//! - [`Retry`] detailed outcome of scheduling a retry

mod lease;
mod work_queue;

pub use lease::Lease;
pub use work_queue::{Retry, WorkQueue};
