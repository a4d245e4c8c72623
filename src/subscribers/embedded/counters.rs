//! # Counters: in-process metrics sink
//!
//! Keeps monotonic counters for processing outcomes plus the last observed queue
//! depth. Share one `Arc<Counters>` between the controller's subscriber list and
//! whatever exports the numbers (health endpoint, periodic log line, tests).
//!
//! ```text
//! on_event(ev):
//!   ProcessingStarted   → started += 1, depth = ev.count
//!   ProcessingSucceeded → succeeded += 1, latency_ms_total += ev.elapsed_ms
//!   ProcessingFailed    → failed += 1,    latency_ms_total += ev.elapsed_ms
//!   RetryScheduled      → retries += 1
//!   RetriesExhausted    → exhausted += 1
//!   ResyncTriggered     → resyncs += 1
//!   WatchClosed         → relists += 1
//!   KeyEnqueued         → depth = ev.count
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Atomic counters fed from runtime events.
#[derive(Default, Debug)]
pub struct Counters {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    exhausted: AtomicU64,
    resyncs: AtomicU64,
    relists: AtomicU64,
    latency_ms_total: AtomicU64,
    depth: AtomicU64,
}

/// Point-in-time copy of [`Counters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    /// Handler invocations started.
    pub started: u64,
    /// Handler invocations that succeeded.
    pub succeeded: u64,
    /// Handler invocations that failed (including timeouts).
    pub failed: u64,
    /// Retries scheduled.
    pub retries: u64,
    /// Keys dropped after exhausting retries.
    pub exhausted: u64,
    /// Resync rounds.
    pub resyncs: u64,
    /// Watch streams that ended and forced a relist.
    pub relists: u64,
    /// Sum of handler latencies, in milliseconds.
    pub latency_ms_total: u64,
    /// Last observed queue depth.
    pub depth: u64,
}

impl Counters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every counter.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            started: self.started.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            relists: self.relists.load(Ordering::Relaxed),
            latency_ms_total: self.latency_ms_total.load(Ordering::Relaxed),
            depth: self.depth.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn add_latency(&self, ev: &Event) {
        if let Some(ms) = ev.elapsed_ms {
            self.latency_ms_total
                .fetch_add(u64::from(ms), Ordering::Relaxed);
        }
    }

    fn set_depth(&self, ev: &Event) {
        if let Some(depth) = ev.count {
            self.depth.store(depth, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl Subscribe for Counters {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::ProcessingStarted => {
                Self::bump(&self.started);
                self.set_depth(ev);
            }
            EventKind::ProcessingSucceeded => {
                Self::bump(&self.succeeded);
                self.add_latency(ev);
            }
            EventKind::ProcessingFailed => {
                Self::bump(&self.failed);
                self.add_latency(ev);
            }
            EventKind::RetryScheduled => Self::bump(&self.retries),
            EventKind::RetriesExhausted => Self::bump(&self.exhausted),
            EventKind::ResyncTriggered => Self::bump(&self.resyncs),
            EventKind::WatchClosed => Self::bump(&self.relists),
            EventKind::KeyEnqueued => self.set_depth(ev),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "counters"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}
