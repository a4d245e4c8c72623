//! Retry delay policies.
//!
//! These knobs control **how long** a key waits before it becomes ready again
//! after a failed handler invocation, and how long the event source waits before
//! relisting after a watch that delivered nothing.
//!
//! ## Contents
//! - [`BackoffPolicy`] how delays evolve per retry (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! ControllerConfig { backoff, relist_backoff, .. }
//!      ├─► queue::WorkQueue::add_after_failure(key) → backoff.next(retries)
//!      └─► source::EventSource relist loop          → relist_backoff.next(failed_watches)
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=5ms, factor=2.0, max=1000s, jitter=None.
//! - `JitterPolicy::None` by default; consider `Equal` when many keys fail together.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
