//! # Controller configuration.
//!
//! Provides [`ControllerConfig`], the settings of one controller instance.
//! It is passed to [`Controller::builder`](crate::Controller::builder) and checked by
//! [`ControllerConfig::validate`] when the controller is built.
//!
//! ## Sentinel values
//! - `concurrent_workers = 0` → coerced to 1
//! - `processing_timeout = Some(0s)` → no timeout (same as `None`)
//! - `grace = 0s` → no drain wait; stuck handlers are detached immediately
//! - `resync_interval = 0s` → rejected by `validate()`

use std::borrow::Cow;
use std::time::Duration;

use crate::error::BuildError;
use crate::policies::BackoffPolicy;

/// Configuration of one controller.
///
/// ## Field semantics
/// - `name`: label used in logs and shutdown reasons
/// - `concurrent_workers`: number of worker slots pulling from the queue (`0` = 1)
/// - `resync_interval`: period of the full re-enqueue of every known key
/// - `max_retries`: failures tolerated per key before it is dropped (`0` = no retry)
/// - `processing_timeout`: per-invocation deadline (`None`/`0s` = unbounded)
/// - `backoff`: per-key failure backoff
/// - `relist_backoff`: wait before relisting after watches that delivered nothing
/// - `grace`: drain window for in-flight handlers on stop
/// - `bus_capacity`: event bus ring buffer size (min 1)
///
/// ## Notes
/// All fields are public. Prefer the accessors, which apply the sentinels.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Label used in logs and events.
    pub name: Cow<'static, str>,

    /// Number of concurrent workers.
    ///
    /// Each worker handles one key at a time; a key is never handled by two workers at once.
    pub concurrent_workers: usize,

    /// Interval between full resyncs.
    ///
    /// Every key currently known to the store is re-enqueued once per interval.
    /// Resync goes through the queue, so it never bypasses deduplication or backoff.
    pub resync_interval: Duration,

    /// Maximum number of retries per key.
    ///
    /// An always-failing key is handled `max_retries + 1` times, then dropped and
    /// reported until its next watch event or resync.
    pub max_retries: u32,

    /// Optional per-invocation timeout.
    ///
    /// On expiry the invocation's token is cancelled and the attempt counts as a
    /// retryable failure.
    pub processing_timeout: Option<Duration>,

    /// Per-key failure backoff.
    pub backoff: BackoffPolicy,

    /// Backoff between relists when watches keep closing without delivering anything.
    pub relist_backoff: BackoffPolicy,

    /// Maximum time to wait for in-flight handlers on stop.
    ///
    /// When exceeded, handler tokens are cancelled, stuck workers are detached and
    /// `run` returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl ControllerConfig {
    /// Returns the worker count with `0` coerced to `1`.
    #[inline]
    pub fn workers(&self) -> usize {
        self.concurrent_workers.max(1)
    }

    /// Returns the processing timeout with `0s` normalized to `None`.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.processing_timeout.filter(|d| !d.is_zero())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks the configuration for values that cannot be normalized.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.resync_interval.is_zero() {
            return Err(BuildError::InvalidConfig {
                reason: "resync_interval must be greater than zero".into(),
            });
        }
        let policies = [
            ("backoff", &self.backoff),
            ("relist_backoff", &self.relist_backoff),
        ];
        for (field, policy) in policies {
            if !policy.factor.is_finite() || policy.factor < 1.0 {
                return Err(BuildError::InvalidConfig {
                    reason: format!("{field}.factor must be finite and >= 1.0"),
                });
            }
            if policy.first > policy.max {
                return Err(BuildError::InvalidConfig {
                    reason: format!("{field}.first must not exceed {field}.max"),
                });
            }
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    /// Default configuration:
    ///
    /// - `name = "controller"`
    /// - `concurrent_workers = 3`
    /// - `resync_interval = 3min`
    /// - `max_retries = 3`
    /// - `processing_timeout = None`
    /// - `backoff = 5ms ×2 up to 1000s`
    /// - `relist_backoff = 100ms ×2 up to 30s`
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("controller"),
            concurrent_workers: 3,
            resync_interval: Duration::from_secs(180),
            max_retries: 3,
            processing_timeout: None,
            backoff: BackoffPolicy::default(),
            relist_backoff: BackoffPolicy::exponential(
                Duration::from_millis(100),
                Duration::from_secs(30),
            ),
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_normalized() {
        let cfg = ControllerConfig {
            concurrent_workers: 0,
            processing_timeout: Some(Duration::ZERO),
            bus_capacity: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(cfg.workers(), 1);
        assert_eq!(cfg.timeout(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_resync_interval_is_rejected() {
        let cfg = ControllerConfig {
            resync_interval: Duration::ZERO,
            ..ControllerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(BuildError::InvalidConfig { .. })));
    }

    #[test]
    fn test_shrinking_backoff_is_rejected() {
        let mut cfg = ControllerConfig::default();
        cfg.relist_backoff.factor = 0.5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("relist_backoff"));
    }
}
