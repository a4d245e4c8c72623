//! # LogWriter: events to `tracing`
//!
//! A subscriber that turns each [`Event`] into one `tracing` record with
//! structured fields. Installing a `tracing` subscriber (format, filter, sink) is
//! left to the application.
//!
//! ## Levels
//! - `debug`: per-key chatter (enqueued, started, succeeded)
//! - `info`: lifecycle, leadership, resync, lists
//! - `warn`: failures that will be retried, watch closures, overflow, grace exceeded
//! - `error`: exhausted retries, source failures, subscriber panics

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event-to-tracing subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let key = e.key.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::KeyEnqueued => debug!(key, depth = e.count, "enqueued"),
            EventKind::ProcessingStarted => {
                debug!(key, attempt = e.attempt, worker = e.worker, "processing")
            }
            EventKind::ProcessingSucceeded => {
                debug!(key, attempt = e.attempt, elapsed_ms = e.elapsed_ms, "processed")
            }
            EventKind::ProcessingFailed => {
                warn!(
                    key,
                    attempt = e.attempt,
                    elapsed_ms = e.elapsed_ms,
                    reason,
                    "processing failed"
                )
            }
            EventKind::TimeoutHit => warn!(key, timeout_ms = e.timeout_ms, "processing timed out"),
            EventKind::RetryScheduled => {
                warn!(key, attempt = e.attempt, delay_ms = e.delay_ms, reason, "retry scheduled")
            }
            EventKind::RetriesExhausted => {
                error!(key, attempt = e.attempt, reason, "retries exhausted; key dropped")
            }
            EventKind::Listed => info!(items = e.count, version = reason, "listed"),
            EventKind::WatchClosed => {
                warn!(reason, delay_ms = e.delay_ms, "watch closed; relisting")
            }
            EventKind::SourceFailed => error!(reason, "event source failed"),
            EventKind::ResyncTriggered => info!(keys = e.count, "resync"),
            EventKind::LeadershipAcquired => info!("leadership acquired"),
            EventKind::LeadershipLost => warn!("leadership lost"),
            EventKind::PipelineStarted => info!(workers = e.count, "pipeline started"),
            EventKind::ShutdownRequested => info!(reason, "shutdown requested"),
            EventKind::AllStoppedWithin => info!("all workers stopped within grace"),
            EventKind::GraceExceeded => warn!(stuck = e.count, "grace exceeded"),
            EventKind::PipelineStopped => info!("pipeline stopped"),
            EventKind::SubscriberOverflow => warn!(reason, "subscriber overflow"),
            EventKind::SubscriberPanicked => error!(reason, "subscriber panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
