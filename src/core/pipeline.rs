//! # Pipeline: one running period.
//!
//! A running period wires a fresh [`WorkQueue`] and [`Store`] to the event source,
//! the resync loop and the worker pool, and tears them down in order.
//!
//! ## Architecture
//! ```text
//! Pipeline::run(period)
//!   ├─► spawn EventSource::run(source_token)      list+watch → store → queue
//!   ├─► spawn run_resync(source_token)            store keys → queue, every interval
//!   ├─► spawn N × Worker::run(handler_token)      queue → handler
//!   ├─► publish PipelineStarted
//!   │
//!   ├─► wait: period cancelled  |  source failed
//!   │
//!   ├─► publish ShutdownRequested
//!   ├─► cancel source_token, await source + resync   (no more adds)
//!   ├─► queue.shut_down()                            (blocked get() → None)
//!   ├─► wait in-flight ≤ grace:
//!   │     ├─ idle         → join workers, publish AllStoppedWithin
//!   │     └─ grace passed → cancel handler_token, detach workers,
//!   │                       publish GraceExceeded
//!   └─► publish PipelineStopped
//! ```
//!
//! ## Rules
//! - Caller stop: in-flight handlers are left to finish within `grace`; their token
//!   is cancelled only once the window is exceeded.
//! - Leadership loss: the handler token is cancelled right away (best effort); the
//!   drain still waits for every lease before leadership is released.
//! - No handler is invoked after `run` returns: the queue is shut down and idle
//!   workers have exited. Detached workers only finish the invocation they hold.

use tokio::select;
use tokio::task::{JoinError, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::config::ControllerConfig;
use crate::core::resync::run_resync;
use crate::core::state::{ControllerRunState, StateCell};
use crate::core::worker::Worker;
use crate::error::{RuntimeError, SourceError};
use crate::events::{Bus, Event, EventKind};
use crate::handler::HandlerRef;
use crate::queue::WorkQueue;
use crate::source::{EventSource, RetrieverRef, Store};

/// Everything needed to start running periods.
pub(crate) struct Pipeline<P> {
    pub(crate) cfg: ControllerConfig,
    pub(crate) handler: HandlerRef<P>,
    pub(crate) retriever: RetrieverRef<P>,
    pub(crate) bus: Bus,
    pub(crate) state: StateCell,
}

impl<P: Send + Sync + 'static> Pipeline<P> {
    /// Runs one period until `period` is cancelled or the source fails.
    ///
    /// `caller` is the controller-level stop token; it tells a caller stop apart
    /// from a leadership loss when `period` fires.
    pub(crate) async fn run(
        &self,
        period: CancellationToken,
        caller: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let queue = WorkQueue::new(self.cfg.backoff, self.cfg.max_retries);
        let store: Store<P> = Store::new();
        let source_token = period.child_token();
        let handler_token = CancellationToken::new();

        let source = EventSource::new(
            self.retriever.clone(),
            store.clone(),
            queue.clone(),
            self.bus.clone(),
            self.cfg.relist_backoff,
        );
        let mut source = tokio::spawn(source.run(source_token.clone()));
        let resync = tokio::spawn(run_resync(
            store.clone(),
            queue.clone(),
            self.bus.clone(),
            self.cfg.resync_interval,
            source_token.clone(),
        ));

        let workers = self.cfg.workers();
        let mut set = JoinSet::new();
        for index in 0..workers {
            let worker = Worker {
                index: u32::try_from(index).unwrap_or(u32::MAX),
                handler: self.handler.clone(),
                store: store.clone(),
                queue: queue.clone(),
                bus: self.bus.clone(),
                timeout: self.cfg.timeout(),
            };
            set.spawn(worker.run(handler_token.clone()));
        }
        self.bus
            .publish(Event::new(EventKind::PipelineStarted).with_count(workers));

        let (outcome, source_done) = select! {
            res = &mut source => (flatten(res), true),
            _ = period.cancelled() => (Ok(()), false),
        };

        let reason = match &outcome {
            Err(e) => e.to_string(),
            Ok(()) if caller.is_cancelled() => format!("{}: stop requested", self.cfg.name),
            Ok(()) => format!("{}: leadership lost", self.cfg.name),
        };
        let leadership_lost = outcome.is_ok() && !caller.is_cancelled();
        if !leadership_lost {
            self.state.advance(ControllerRunState::Stopping);
        }
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_reason(reason));
        if leadership_lost {
            handler_token.cancel();
        }

        source_token.cancel();
        if !source_done {
            let _ = source.await;
        }
        let _ = resync.await;
        queue.shut_down();

        let drained = self.drain(&mut set, &queue, &handler_token).await;
        self.bus.publish(Event::new(EventKind::PipelineStopped));

        outcome?;
        drained
    }

    /// Waits for in-flight handlers within the grace window.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the keys still in flight.
    async fn drain(
        &self,
        set: &mut JoinSet<()>,
        queue: &WorkQueue,
        handlers: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        match time::timeout(grace, queue.wait_idle()).await {
            Ok(()) => {
                while set.join_next().await.is_some() {}
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck: Vec<String> = queue
                    .in_flight()
                    .into_iter()
                    .map(|key| key.to_string())
                    .collect();
                handlers.cancel();
                set.detach_all();
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_count(stuck.len()));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

fn flatten(res: Result<Result<(), SourceError>, JoinError>) -> Result<(), SourceError> {
    match res {
        Ok(inner) => inner,
        Err(e) => Err(SourceError::watch(format!("event source task aborted: {e}"))),
    }
}
