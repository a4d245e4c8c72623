//! # Controller: lifecycle owner.
//!
//! Owns the configuration, the capabilities (handler, retriever, optional leader
//! elector), the event bus and the subscribers, and drives running periods.
//!
//! ## Architecture
//! ```text
//! Controller::run(stop)
//!   ├─► state: Created → Running
//!   ├─► spawn subscriber listener (Bus → SubscriberSet)
//!   ├─► without elector: Pipeline::run(stop)
//!   │   with elector:    run_gated(...)  (acquire → Pipeline::run → lose → release → ...)
//!   ├─► state: → Stopping → Stopped
//!   ├─► flush subscribers
//!   └─► return the period's result
//! ```
//!
//! ## Rules
//! - `run` may be called once; later calls return [`RuntimeError::AlreadyRun`].
//! - Only source failures, drain timeouts and signal setup failures reach the caller;
//!   per-key failures stay inside the retry mechanism.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use futures::{StreamExt, stream};
//! use tokio_util::sync::CancellationToken;
//! use reconvisor::{
//!     Controller, ControllerConfig, HandlerError, HandlerFn, ListResult, LogWriter,
//!     ResourceKey, Retriever, SourceError, WatchStream,
//! };
//!
//! struct Fixed;
//!
//! #[async_trait]
//! impl Retriever<String> for Fixed {
//!     async fn list(&self) -> Result<ListResult<String>, SourceError> {
//!         Ok(ListResult::new(vec![(ResourceKey::from("default/web"), "v1".into())], "1"))
//!     }
//!     async fn watch(&self, _from: &str) -> Result<WatchStream<String>, SourceError> {
//!         Ok(stream::pending().boxed())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = HandlerFn::arc(
//!         |_ctx: CancellationToken, key: ResourceKey, spec: Option<Arc<String>>| async move {
//!             println!("reconcile {key}: {spec:?}");
//!             Ok::<_, HandlerError>(())
//!         },
//!     );
//!
//!     let controller = Controller::builder(ControllerConfig::default())
//!         .with_handler(handler)
//!         .with_retriever(Arc::new(Fixed))
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build()?;
//!
//!     controller.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::select;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::core::builder::ControllerBuilder;
use crate::core::config::ControllerConfig;
use crate::core::pipeline::Pipeline;
use crate::core::shutdown;
use crate::core::state::ControllerRunState;
use crate::error::RuntimeError;
use crate::events::Event;
use crate::leader::{LeaderConfig, LeaderElector, LeadershipState, run_gated};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Reconciliation controller for payload type `P`.
pub struct Controller<P> {
    pub(crate) pipeline: Pipeline<P>,
    pub(crate) leader: Option<(Arc<dyn LeaderElector>, LeaderConfig)>,
    pub(crate) leadership: watch::Sender<LeadershipState>,
    pub(crate) subscribers: Mutex<Vec<Arc<dyn Subscribe>>>,
    pub(crate) started: AtomicBool,
}

impl<P: Send + Sync + 'static> Controller<P> {
    /// Starts building a controller with `cfg`.
    pub fn builder(cfg: ControllerConfig) -> ControllerBuilder<P> {
        ControllerBuilder::new(cfg)
    }

    /// Runs until `stop` is cancelled or a fatal error occurs.
    ///
    /// On stop the event source and resync halt first, then the queue shuts down,
    /// then in-flight handlers get up to `grace` to finish.
    pub async fn run(&self, stop: CancellationToken) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyRun);
        }

        let subs = std::mem::take(
            &mut *self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let bus = self.pipeline.bus.clone();
        let listener_token = CancellationToken::new();
        let listener = tokio::spawn(forward(
            bus.subscribe(),
            SubscriberSet::new(subs, bus),
            listener_token.clone(),
        ));

        self.pipeline.state.advance(ControllerRunState::Running);
        let res = match &self.leader {
            Some((elector, cfg)) => {
                run_gated(
                    &self.pipeline,
                    elector.as_ref(),
                    cfg,
                    &self.leadership,
                    &stop,
                )
                .await
            }
            None => {
                self.leadership.send_replace(LeadershipState::Leader);
                let res = self.pipeline.run(stop.clone(), &stop).await;
                self.leadership.send_replace(LeadershipState::Follower);
                res
            }
        };
        self.pipeline.state.advance(ControllerRunState::Stopping);
        self.pipeline.state.advance(ControllerRunState::Stopped);

        listener_token.cancel();
        if let Ok(set) = listener.await {
            set.shutdown().await;
        }
        res
    }

    /// Runs until SIGINT, SIGTERM or SIGQUIT (Ctrl-C on non-unix) or a fatal error.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        let stop = CancellationToken::new();
        let run = self.run(stop.clone());
        tokio::pin!(run);

        select! {
            res = &mut run => res,
            sig = shutdown::wait_for_signal() => {
                stop.cancel();
                let res = run.await;
                match sig {
                    Ok(()) => res,
                    Err(e) => res.and(Err(RuntimeError::Signal { reason: e.to_string() })),
                }
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerRunState {
        self.pipeline.state.get()
    }

    /// Receiver that observes every lifecycle transition.
    pub fn state_changes(&self) -> watch::Receiver<ControllerRunState> {
        self.pipeline.state.subscribe()
    }

    /// Current leadership as seen by this controller.
    ///
    /// Without an elector the controller reports `Leader` while `run` is active.
    pub fn leadership(&self) -> LeadershipState {
        *self.leadership.borrow()
    }

    /// Creates a receiver of runtime events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.pipeline.bus.subscribe()
    }

    /// Controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.pipeline.cfg
    }
}

/// Forwards bus events to the subscriber set until `token` fires, then drains what
/// is already buffered and hands the set back for shutdown.
async fn forward(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    token: CancellationToken,
) -> SubscriberSet {
    loop {
        select! {
            res = rx.recv() => match res {
                Ok(ev) => set.emit(&ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged behind the event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = token.cancelled() => {
                loop {
                    match rx.try_recv() {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
                break;
            }
        }
    }
    set
}
