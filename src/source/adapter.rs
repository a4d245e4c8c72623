//! # EventSource: list+watch adapter.
//!
//! Turns a [`Retriever`] into a stream of queue adds for one running period.
//!
//! ## Loop
//! ```text
//! loop {
//!   ├─► list()                       ── Err ─► publish SourceFailed, return Err (fatal)
//!   ├─► Store::replace(items)        → add(key) for every item and every vanished key
//!   ├─► watch(version)               ── Err ─► treated like a closed stream
//!   ├─► for each item:
//!   │     ├─ Ok(event) → Store::apply → add(key)
//!   │     └─ Err(e)    → stream is over
//!   ├─► stream over:
//!   │     ├─ delivered something → relist now
//!   │     └─ delivered nothing   → relist after relist_backoff.next(n)
//!   └─► publish WatchClosed
//! }
//! ```
//!
//! ## Rules
//! - Cancellation is honoured at every await point and returns `Ok(())`.
//! - Only a failing `list` ends the loop with an error.
//! - The only state carried between rounds is the last list version and the store.

use std::time::Duration;

use futures::StreamExt;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::events::{Bus, Event, EventKind};
use crate::key::ResourceKey;
use crate::policies::BackoffPolicy;
use crate::queue::WorkQueue;
use crate::source::{ListResult, RetrieverRef, Store, WatchStream};

/// How a watch round ended.
enum WatchEnd {
    /// The running period is stopping.
    Cancelled,
    /// The stream ended or failed after delivering `delivered` items.
    Closed { delivered: usize, reason: String },
}

/// List+watch adapter feeding a [`WorkQueue`].
pub(crate) struct EventSource<P> {
    retriever: RetrieverRef<P>,
    store: Store<P>,
    queue: WorkQueue,
    bus: Bus,
    relist_backoff: BackoffPolicy,
    version: Option<String>,
}

impl<P: Send + Sync + 'static> EventSource<P> {
    pub(crate) fn new(
        retriever: RetrieverRef<P>,
        store: Store<P>,
        queue: WorkQueue,
        bus: Bus,
        relist_backoff: BackoffPolicy,
    ) -> Self {
        Self {
            retriever,
            store,
            queue,
            bus,
            relist_backoff,
            version: None,
        }
    }

    /// Runs list+watch rounds until `token` is cancelled or `list` fails.
    pub(crate) async fn run(mut self, token: CancellationToken) -> Result<(), SourceError> {
        let mut idle_watches: u32 = 0;

        loop {
            let listed = select! {
                res = self.retriever.list() => res,
                _ = token.cancelled() => return Ok(()),
            };
            let listed = match listed {
                Ok(listed) => listed,
                Err(e) => {
                    self.bus
                        .publish(Event::new(EventKind::SourceFailed).with_reason(e.to_string()));
                    return Err(e);
                }
            };
            let version = self.relist(listed);

            let end = select! {
                res = self.retriever.watch(&version) => match res {
                    Ok(stream) => self.drain(stream, &token).await,
                    Err(e) => WatchEnd::Closed { delivered: 0, reason: e.to_string() },
                },
                _ = token.cancelled() => WatchEnd::Cancelled,
            };

            let (delivered, reason) = match end {
                WatchEnd::Cancelled => return Ok(()),
                WatchEnd::Closed { delivered, reason } => (delivered, reason),
            };

            let delay = if delivered > 0 {
                idle_watches = 0;
                Duration::ZERO
            } else {
                let delay = self.relist_backoff.next(idle_watches);
                idle_watches = idle_watches.saturating_add(1);
                delay
            };
            self.bus.publish(
                Event::new(EventKind::WatchClosed)
                    .with_reason(reason)
                    .with_delay(delay),
            );

            if !delay.is_zero() {
                select! {
                    _ = time::sleep(delay) => {}
                    _ = token.cancelled() => return Ok(()),
                }
            }
        }
    }

    /// Replaces the store with a fresh list and enqueues every listed and vanished key.
    ///
    /// Returns the version to watch from.
    fn relist(&mut self, listed: ListResult<P>) -> String {
        let ListResult { items, version } = listed;
        let count = items.len();
        let keys: Vec<ResourceKey> = items.iter().map(|(key, _)| key.clone()).collect();

        let vanished = self.store.replace(items);
        for key in keys.into_iter().chain(vanished) {
            self.enqueue(key);
        }

        self.bus.publish(
            Event::new(EventKind::Listed)
                .with_count(count)
                .with_reason(version.as_str()),
        );
        self.version = Some(version.clone());
        version
    }

    /// Applies watch items until the stream ends, fails, or `token` is cancelled.
    async fn drain(&self, mut stream: WatchStream<P>, token: &CancellationToken) -> WatchEnd {
        let mut delivered = 0usize;
        loop {
            let item = select! {
                item = stream.next() => item,
                _ = token.cancelled() => return WatchEnd::Cancelled,
            };
            match item {
                Some(Ok(event)) => {
                    delivered += 1;
                    let key = self.store.apply(event);
                    self.enqueue(key);
                }
                Some(Err(e)) => {
                    return WatchEnd::Closed {
                        delivered,
                        reason: e.to_string(),
                    };
                }
                None => {
                    return WatchEnd::Closed {
                        delivered,
                        reason: format!(
                            "stream ended (from version {})",
                            self.version.as_deref().unwrap_or("")
                        ),
                    };
                }
            }
        }
    }

    fn enqueue(&self, key: ResourceKey) {
        let shared = key.shared();
        if self.queue.add(key) {
            self.bus.publish(
                Event::new(EventKind::KeyEnqueued)
                    .with_key(shared)
                    .with_count(self.queue.len()),
            );
        }
    }
}
