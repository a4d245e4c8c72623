//! Leadership: optional gate in front of the running period.
//!
//! ## Contents
//! - [`LeaderElector`] the caller-supplied capability (`try_acquire`, `lost`, `release`)
//! - [`LeaderConfig`] retry period and reacquire behaviour
//! - [`LeadershipState`] what [`Controller::leadership`](crate::Controller::leadership) reports
//! - [`LeaseLock`], [`LocalElector`] an in-process implementation
//! - `run_gated` (internal) the acquire → run → lose → release loop

mod elector;
mod gate;
mod local;

pub use elector::{LeaderConfig, LeaderElector, LeadershipState};
pub(crate) use gate::run_gated;
pub use local::{LeaseLock, LocalElector};
