//! # Resync: periodic re-enqueue of every known key.
//!
//! Level-triggered safety net: once per interval every key in the [`Store`] is
//! added to the queue again, so drift the watch never reported still gets
//! reconciled. Adds go through the normal [`WorkQueue::add`] path and are
//! deduplicated like any other event.
//!
//! The first tick fires one full interval after the running period starts; the
//! initial list already enqueued everything.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::queue::WorkQueue;
use crate::source::Store;

/// Re-enqueues `store`'s keys every `interval` until `token` is cancelled.
pub(crate) async fn run_resync<P>(
    store: Store<P>,
    queue: WorkQueue,
    bus: Bus,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = token.cancelled() => return,
        }

        let keys = store.keys();
        let count = keys.len();
        for key in keys {
            if !queue.add(key) {
                return;
            }
        }
        bus.publish(Event::new(EventKind::ResyncTriggered).with_count(count));
    }
}
