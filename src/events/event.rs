//! # Runtime events emitted by the controller, its pipeline and workers.
//!
//! The [`EventKind`] enum classifies events across five groups:
//! - **Source events**: list/watch ingestion (listed, relisting, watch closed, source failed)
//! - **Queue and worker events**: per-key processing (enqueued, started, outcome, retries)
//! - **Resync events**: periodic re-enumeration
//! - **Leadership events**: acquisition and loss
//! - **Lifecycle events**: running period start/stop, drain results, subscriber health
//!
//! The [`Event`] struct carries metadata such as timestamps, the resource key,
//! reasons, counts and delays. Events are purely observational: nothing in the
//! runtime changes behaviour based on whether they are delivered.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use reconvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_key("default/web-0")
//!     .with_reason("connection refused")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(20));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.key.as_deref(), Some("default/web-0"));
//! assert_eq!(ev.delay_ms, Some(20));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Source events ===
    /// A full list completed.
    ///
    /// Sets: `count` (items listed), `reason` (resource version).
    Listed,

    /// The watch stream ended; a relist follows.
    ///
    /// Sets: `reason` (why it ended), `delay_ms` (wait before relisting, may be 0).
    WatchClosed,

    /// The event source failed fatally (list failed).
    ///
    /// Sets: `reason`.
    SourceFailed,

    // === Queue and worker events ===
    /// A key was handed to the work queue.
    ///
    /// Sets: `key`, `count` (queue depth after the add).
    KeyEnqueued,

    /// A worker started a handler invocation.
    ///
    /// Sets: `key`, `attempt` (1-based), `worker`, `count` (queue depth).
    ProcessingStarted,

    /// Handler invocation succeeded.
    ///
    /// Sets: `key`, `attempt`, `worker`, `elapsed_ms`.
    ProcessingSucceeded,

    /// Handler invocation failed.
    ///
    /// Sets: `key`, `attempt`, `worker`, `reason`, `elapsed_ms`.
    ProcessingFailed,

    /// Handler invocation exceeded the processing timeout.
    ///
    /// Sets: `key`, `attempt`, `timeout_ms`.
    TimeoutHit,

    /// Failed key requeued with backoff.
    ///
    /// Sets: `key`, `attempt` (the failed attempt), `delay_ms`, `reason`.
    RetryScheduled,

    /// Retry budget exhausted (or fatal handler error); key dropped until its next event.
    ///
    /// Sets: `key`, `attempt`, `reason`.
    RetriesExhausted,

    // === Resync events ===
    /// Periodic resync re-enqueued every known key.
    ///
    /// Sets: `count` (keys re-enqueued).
    ResyncTriggered,

    // === Leadership events ===
    /// This process acquired leadership.
    LeadershipAcquired,

    /// This process lost leadership; the running period is being stopped.
    LeadershipLost,

    // === Lifecycle events ===
    /// A running period (source + queue + resync + workers) started.
    ///
    /// Sets: `count` (worker count).
    PipelineStarted,

    /// Stop requested (caller signal, leadership loss or fatal source error).
    ///
    /// Sets: `reason`.
    ShutdownRequested,

    /// All workers settled within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some handlers were still running.
    ///
    /// Sets: `count` (stuck workers).
    GraceExceeded,

    /// A running period fully stopped.
    PipelineStopped,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Resource key, if applicable.
    pub key: Option<Arc<str>>,
    /// Human-readable reason (errors, versions, overflow details).
    pub reason: Option<Arc<str>>,
    /// Attempt count for the key (starting from 1).
    pub attempt: Option<u32>,
    /// Index of the worker slot that produced the event.
    pub worker: Option<u32>,
    /// Generic count (queue depth, listed items, resynced keys, workers).
    pub count: Option<u64>,
    /// Backoff delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Configured timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Handler latency in milliseconds.
    pub elapsed_ms: Option<u32>,
}

fn compact_ms(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            reason: None,
            attempt: None,
            worker: None,
            count: None,
            delay_ms: None,
            timeout_ms: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a resource key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a worker slot index.
    #[inline]
    pub fn with_worker(mut self, n: u32) -> Self {
        self.worker = Some(n);
        self
    }

    /// Attaches a count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n as u64);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a handler latency (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::KeyEnqueued);
        let b = Event::new(EventKind::KeyEnqueued);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_durations_saturate_into_u32_millis() {
        let ev =
            Event::new(EventKind::RetryScheduled).with_delay(Duration::from_secs(u64::MAX / 4));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
