//! Runtime core: orchestration and lifecycle.
//!
//! The public API from this module is [`Controller`] (with [`ControllerBuilder`],
//! [`ControllerConfig`] and [`ControllerRunState`]).
//!
//! Internal modules:
//! - `runner`: executes one handler invocation with timeout/cancellation and event publishing;
//! - `worker`: one worker slot, turns invocation outcomes into queue bookkeeping;
//! - `resync`: periodic re-enqueue of every known key;
//! - `pipeline`: one running period (source, resync, workers) and its ordered teardown;
//! - `controller`: lifecycle, leadership wiring and subscriber fan-out;
//! - `shutdown`: cross-platform termination signals.

mod builder;
mod config;
mod controller;
mod pipeline;
mod resync;
mod runner;
mod shutdown;
mod state;
mod worker;

pub use builder::ControllerBuilder;
pub use config::ControllerConfig;
pub use controller::Controller;
pub(crate) use pipeline::Pipeline;
pub use state::ControllerRunState;
