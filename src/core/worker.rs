//! # Worker: one slot of the worker pool.
//!
//! Pulls keys from the [`WorkQueue`], invokes the handler with the latest payload
//! from the [`Store`] and turns the outcome into queue bookkeeping.
//!
//! ## Loop
//! ```text
//! while let Some(lease) = queue.get() {
//!   ├─► publish ProcessingStarted
//!   ├─► run_once(handler, key, store.get(key))
//!   ├─► Ok            → forget(key)                       (retry counter reset)
//!   ├─► Fail/Timeout/Panic → retry(key)
//!   │                     ├─ Scheduled → publish RetryScheduled
//!   │                     ├─ Exhausted → publish RetriesExhausted
//!   │                     └─ Superseded / ShuttingDown → nothing
//!   ├─► Fatal         → forget(key), publish RetriesExhausted
//!   ├─► Canceled      → nothing if the runtime cancelled, else retry(key)
//!   └─► drop(lease)   → done(key)
//! }
//! ```
//!
//! ## Rules
//! - One key at a time per worker; the queue guarantees one worker per key.
//! - A panicking handler fails its attempt; the worker keeps serving the queue.
//! - The worker exits when `get` returns `None` (queue shut down). It never
//!   abandons a lease: a handler that ignores cancellation keeps its key in flight
//!   until it returns.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::runner::{Attempt, run_once};
use crate::error::HandlerError;
use crate::events::{Bus, Event, EventKind};
use crate::handler::HandlerRef;
use crate::key::ResourceKey;
use crate::queue::{Retry, WorkQueue};
use crate::source::Store;

/// One worker slot.
pub(crate) struct Worker<P> {
    pub(crate) index: u32,
    pub(crate) handler: HandlerRef<P>,
    pub(crate) store: Store<P>,
    pub(crate) queue: WorkQueue,
    pub(crate) bus: Bus,
    pub(crate) timeout: Option<Duration>,
}

impl<P: Send + Sync + 'static> Worker<P> {
    /// Processes keys until the queue shuts down.
    ///
    /// `handlers` is the parent of every invocation token; cancelling it asks
    /// in-flight handlers to stop.
    pub(crate) async fn run(self, handlers: CancellationToken) {
        while let Some(lease) = self.queue.get().await {
            let key = lease.key().clone();
            let attempt = Attempt {
                number: self.queue.num_requeues(&key).saturating_add(1),
                worker: self.index,
            };

            self.bus.publish(
                Event::new(EventKind::ProcessingStarted)
                    .with_key(key.shared())
                    .with_attempt(attempt.number)
                    .with_worker(self.index)
                    .with_count(self.queue.len()),
            );

            let payload = self.store.get(&key);
            let res = run_once(
                self.handler.as_ref(),
                &handlers,
                &key,
                payload,
                self.timeout,
                attempt,
                &self.bus,
            )
            .await;

            match res {
                Ok(()) => self.queue.forget(&key),
                Err(HandlerError::Canceled) if handlers.is_cancelled() => {}
                Err(e) if e.is_retryable() || e == HandlerError::Canceled => {
                    self.schedule_retry(&key, &e);
                }
                Err(e) => {
                    self.queue.forget(&key);
                    self.publish_exhausted(&key, attempt.number, &e);
                }
            }
            drop(lease);
        }
    }

    fn schedule_retry(&self, key: &ResourceKey, err: &HandlerError) {
        match self.queue.retry(key) {
            Retry::Scheduled { delay, attempt } => {
                self.bus.publish(
                    Event::new(EventKind::RetryScheduled)
                        .with_key(key.shared())
                        .with_attempt(attempt)
                        .with_worker(self.index)
                        .with_delay(delay)
                        .with_reason(err.to_string()),
                );
            }
            Retry::Exhausted { attempts } => self.publish_exhausted(key, attempts, err),
            Retry::Superseded | Retry::ShuttingDown => {}
        }
    }

    fn publish_exhausted(&self, key: &ResourceKey, attempts: u32, err: &HandlerError) {
        self.bus.publish(
            Event::new(EventKind::RetriesExhausted)
                .with_key(key.shared())
                .with_attempt(attempts)
                .with_worker(self.index)
                .with_reason(err.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerFn;
    use crate::policies::BackoffPolicy;
    use crate::source::ResourceEvent;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };
    use tokio::time;

    fn worker(handler: HandlerRef<u32>, queue: WorkQueue, bus: Bus) -> Worker<u32> {
        Worker {
            index: 0,
            handler,
            store: Store::new(),
            queue,
            bus,
            timeout: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_key_is_handled_max_retries_plus_one_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let handler: HandlerRef<u32> = HandlerFn::arc(
            move |_ctx: CancellationToken, _key: ResourceKey, _p: Option<Arc<u32>>| {
                seen.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(HandlerError::fail("boom")) }
            },
        );
        let queue = WorkQueue::new(
            BackoffPolicy::exponential(Duration::from_millis(5), Duration::from_millis(50)),
            2,
        );
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let w = worker(handler, queue.clone(), bus);
        let handle = tokio::spawn(w.run(CancellationToken::new()));
        queue.add(ResourceKey::from("a"));

        loop {
            let ev = rx.recv().await.unwrap();
            if ev.kind == EventKind::RetriesExhausted {
                assert_eq!(ev.attempt, Some(3));
                break;
            }
        }
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(queue.is_empty());

        queue.shut_down();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_fatal_error_drops_key_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let handler: HandlerRef<u32> = HandlerFn::arc(
            move |_ctx: CancellationToken, _key: ResourceKey, _p: Option<Arc<u32>>| {
                seen.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(HandlerError::fatal("bad spec")) }
            },
        );
        let queue = WorkQueue::new(BackoffPolicy::default(), 5);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let w = worker(handler, queue.clone(), bus);
        let handle = tokio::spawn(w.run(CancellationToken::new()));
        queue.add(ResourceKey::from("a"));

        loop {
            if rx.recv().await.unwrap().kind == EventKind::RetriesExhausted {
                break;
            }
        }
        queue.shut_down();
        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.num_requeues(&ResourceKey::from("a")), 0);
    }

    #[tokio::test]
    async fn test_handler_receives_latest_payload_or_none() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: HandlerRef<u32> = HandlerFn::arc(
            move |_ctx: CancellationToken, key: ResourceKey, p: Option<Arc<u32>>| {
                sink.lock().unwrap().push((key, p.as_deref().copied()));
                async { Ok::<_, HandlerError>(()) }
            },
        );
        let queue = WorkQueue::new(BackoffPolicy::default(), 3);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let w = worker(handler, queue.clone(), bus);
        w.store.apply(ResourceEvent::Added(ResourceKey::from("a"), 9));

        let handle = tokio::spawn(w.run(CancellationToken::new()));
        queue.add(ResourceKey::from("a"));
        queue.add(ResourceKey::from("gone"));

        let mut done = 0;
        while done < 2 {
            if rx.recv().await.unwrap().kind == EventKind::ProcessingSucceeded {
                done += 1;
            }
        }
        queue.shut_down();
        handle.await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (ResourceKey::from("a"), Some(9)),
                (ResourceKey::from("gone"), None)
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_keeps_worker_alive() {
        let handled = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = handled.clone();
        let handler: HandlerRef<u32> = HandlerFn::arc(
            move |_ctx: CancellationToken, key: ResourceKey, _p: Option<Arc<u32>>| {
                let sink = sink.clone();
                async move {
                    if key.as_str() == "bad" {
                        panic!("poisoned payload");
                    }
                    sink.lock().unwrap().push(key);
                    Ok::<_, HandlerError>(())
                }
            },
        );
        let queue = WorkQueue::new(BackoffPolicy::default(), 0);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let w = worker(handler, queue.clone(), bus);
        let handle = tokio::spawn(w.run(CancellationToken::new()));
        queue.add(ResourceKey::from("bad"));
        queue.add(ResourceKey::from("good"));

        let mut exhausted = None;
        let mut succeeded = false;
        while exhausted.is_none() || !succeeded {
            let ev = rx.recv().await.unwrap();
            match ev.kind {
                EventKind::RetriesExhausted => exhausted = ev.reason.clone(),
                EventKind::ProcessingSucceeded => succeeded = true,
                _ => {}
            }
        }
        queue.shut_down();
        handle.await.unwrap();

        assert_eq!(*handled.lock().unwrap(), vec![ResourceKey::from("good")]);
        assert!(exhausted.unwrap().contains("handler panicked: poisoned payload"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spontaneous_cancel_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let handler: HandlerRef<u32> = HandlerFn::arc(
            move |_ctx: CancellationToken, _key: ResourceKey, _p: Option<Arc<u32>>| {
                seen.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(HandlerError::Canceled) }
            },
        );
        let queue = WorkQueue::new(
            BackoffPolicy::exponential(Duration::from_millis(5), Duration::from_millis(50)),
            1,
        );
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let w = worker(handler, queue.clone(), bus);
        let handle = tokio::spawn(w.run(CancellationToken::new()));
        queue.add(ResourceKey::from("a"));

        let mut kinds = Vec::new();
        loop {
            let kind = rx.recv().await.unwrap().kind;
            if matches!(kind, EventKind::RetryScheduled | EventKind::RetriesExhausted) {
                kinds.push(kind);
            }
            if kind == EventKind::RetriesExhausted {
                break;
            }
        }
        queue.shut_down();
        handle.await.unwrap();

        assert_eq!(
            kinds,
            vec![EventKind::RetryScheduled, EventKind::RetriesExhausted]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_requested_by_runtime_is_not_retried() {
        let handler: HandlerRef<u32> = HandlerFn::arc(
            |ctx: CancellationToken, _key: ResourceKey, _p: Option<Arc<u32>>| async move {
                ctx.cancelled().await;
                Err::<(), _>(HandlerError::Canceled)
            },
        );
        let queue = WorkQueue::new(BackoffPolicy::default(), 3);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let handlers = CancellationToken::new();

        let handle = tokio::spawn(worker(handler, queue.clone(), bus).run(handlers.clone()));
        queue.add(ResourceKey::from("a"));

        while rx.recv().await.unwrap().kind != EventKind::ProcessingStarted {}
        handlers.cancel();
        while rx.recv().await.unwrap().kind != EventKind::ProcessingFailed {}
        queue.shut_down();
        handle.await.unwrap();

        assert_eq!(queue.num_requeues(&ResourceKey::from("a")), 0);
        assert!(rx.try_recv().is_err());
    }
}
