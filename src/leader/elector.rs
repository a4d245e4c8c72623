//! # Leader election capability.
//!
//! A [`LeaderElector`] decides whether this controller may run. The controller
//! only drives it; how leadership is decided (a lease object in a cluster, a
//! database row, a local lock) is up to the implementation.

use std::time::Duration;

use async_trait::async_trait;

/// Leadership capability supplied by the caller.
///
/// ## Contract
/// - [`try_acquire`](LeaderElector::try_acquire) returns `true` if this instance
///   holds leadership after the call. Calling it again while leading returns `true`.
/// - [`lost`](LeaderElector::lost) resolves once leadership acquired earlier has been
///   lost (expired, revoked, taken over). It is only awaited while leading.
/// - [`release`](LeaderElector::release) gives leadership up voluntarily. The
///   controller calls it after the running period has fully stopped, so another
///   instance never runs while this one still processes keys.
#[async_trait]
pub trait LeaderElector: Send + Sync + 'static {
    /// Tries to become (or stay) leader.
    async fn try_acquire(&self) -> bool;

    /// Resolves when leadership is lost.
    async fn lost(&self);

    /// Gives leadership up.
    async fn release(&self);
}

/// Leadership settings.
#[derive(Clone, Debug)]
pub struct LeaderConfig {
    /// Wait between failed acquisition attempts.
    pub retry_period: Duration,
    /// Whether to compete again after losing leadership (otherwise `run` returns `Ok`).
    pub reacquire: bool,
}

impl Default for LeaderConfig {
    /// `retry_period = 2s`, `reacquire = true`.
    fn default() -> Self {
        Self {
            retry_period: Duration::from_secs(2),
            reacquire: true,
        }
    }
}

/// Leadership as seen by one controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeadershipState {
    /// `run` has not started yet.
    Unknown,
    /// Processing is active.
    Leader,
    /// Waiting for leadership, or stopped.
    Follower,
}
