use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::core::config::ControllerConfig;
use crate::core::controller::Controller;
use crate::core::pipeline::Pipeline;
use crate::core::state::StateCell;
use crate::error::BuildError;
use crate::events::Bus;
use crate::handler::HandlerRef;
use crate::leader::{LeaderConfig, LeaderElector, LeadershipState};
use crate::source::RetrieverRef;
use crate::subscribers::Subscribe;

/// Builder for a [`Controller`].
///
/// A handler and a retriever are required; everything else is optional.
pub struct ControllerBuilder<P> {
    cfg: ControllerConfig,
    handler: Option<HandlerRef<P>>,
    retriever: Option<RetrieverRef<P>>,
    leader: Option<(Arc<dyn LeaderElector>, LeaderConfig)>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<P: Send + Sync + 'static> ControllerBuilder<P> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ControllerConfig) -> Self {
        Self {
            cfg,
            handler: None,
            retriever: None,
            leader: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the reconciliation handler.
    pub fn with_handler(mut self, handler: HandlerRef<P>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the list+watch source.
    pub fn with_retriever(mut self, retriever: RetrieverRef<P>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Gates processing behind leader election.
    pub fn with_leader_elector(
        mut self,
        elector: Arc<dyn LeaderElector>,
        cfg: LeaderConfig,
    ) -> Self {
        self.leader = Some((elector, cfg));
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with bounded
    /// queues; they start when `run` is called.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and builds the controller.
    pub fn build(self) -> Result<Controller<P>, BuildError> {
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;
        let retriever = self.retriever.ok_or(BuildError::MissingRetriever)?;
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let (leadership, _rx) = watch::channel(LeadershipState::Unknown);

        Ok(Controller {
            pipeline: Pipeline {
                cfg: self.cfg,
                handler,
                retriever,
                bus,
                state: StateCell::new(),
            },
            leader: self.leader,
            leadership,
            subscribers: Mutex::new(self.subscribers),
            started: AtomicBool::new(false),
        })
    }
}
