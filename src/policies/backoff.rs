//! # Per-key retry backoff.
//!
//! [`BackoffPolicy`] maps a retry number to a delay. The work queue keeps the
//! retry counter per key and asks the policy for the delay of the next retry, so
//! the policy itself is stateless and can be shared by every key.
//!
//! The delay for retry `n` (0-indexed) is `first × factor^n`, clamped to `max`,
//! then jittered. The base is derived from `n` alone; the jittered output is never
//! fed back, so delays cannot shrink over time.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use reconvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy::exponential(Duration::from_millis(5), Duration::from_secs(1));
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(5));
//! assert_eq!(backoff.next(1), Duration::from_millis(10));
//! assert_eq!(backoff.next(20), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
///
/// - [`BackoffPolicy::first`]: delay before the first retry;
/// - [`BackoffPolicy::factor`]: multiplicative growth per retry;
/// - [`BackoffPolicy::max`]: upper bound for any delay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied to every computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Per-key failure backoff:
    /// - `first = 5ms`;
    /// - `factor = 2.0`;
    /// - `max = 1000s`.
    fn default() -> Self {
        Self::exponential(Duration::from_millis(5), Duration::from_secs(1000))
    }
}

impl BackoffPolicy {
    /// Doubling backoff from `first` up to `max`, without jitter.
    pub const fn exponential(first: Duration, max: Duration) -> Self {
        Self {
            first,
            max,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Constant delay, without jitter.
    pub const fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns a copy with the given jitter.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the delay before retry number `retry` (0-indexed).
    ///
    /// Non-finite or negative intermediate values (huge exponents, odd factors)
    /// clamp to [`BackoffPolicy::max`].
    pub fn next(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_starts_small_and_doubles() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(0), Duration::from_millis(5));
        assert_eq!(policy.next(1), Duration::from_millis(10));
        assert_eq!(policy.next(2), Duration::from_millis(20));
        assert_eq!(policy.next(3), Duration::from_millis(40));
    }

    #[test]
    fn test_constant_never_grows() {
        let policy = BackoffPolicy::constant(Duration::from_millis(250));
        for retry in 0..10 {
            assert_eq!(policy.next(retry), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_capped_at_max() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.next(10), Duration::from_secs(1));
    }

    #[test]
    fn test_first_above_max_is_clamped() {
        let policy = BackoffPolicy::exponential(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_overflowing_exponent_clamps_to_max() {
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_equal_jitter_stays_within_half_and_base() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(30))
            .with_jitter(JitterPolicy::Equal);

        for retry in 0..12 {
            let base_ms = (100.0 * 2.0f64.powi(retry as i32)).min(30_000.0);
            let delay = policy.next(retry);
            assert!(delay >= Duration::from_millis((base_ms / 2.0) as u64));
            assert!(delay <= Duration::from_millis(base_ms as u64));
        }
    }

    #[test]
    fn test_full_jitter_never_exceeds_base() {
        let policy =
            BackoffPolicy::constant(Duration::from_secs(1)).with_jitter(JitterPolicy::Full);
        for retry in 0..50 {
            assert!(policy.next(retry) <= Duration::from_secs(1));
        }
    }

    #[test]
    fn test_decorrelated_jitter_respects_floor() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(30))
            .with_jitter(JitterPolicy::Decorrelated);

        for _ in 0..100 {
            let delay = policy.next(8);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_secs(30));
        }
    }
}
