//! # Backoff policy for retry delays.
//!
//! [`BackoffPolicy`] controls how the wait between attempts grows. The wait after
//! failed attempt `n` (1-based) is
//!
//! ```text
//! first × factor^(n-1), clamped to max, then jittered
//! ```
//!
//! The base is derived from the attempt number alone, so jitter output never feeds
//! back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskgate::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay_after(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay_after(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay_after(3), Duration::from_millis(400));
//! // 100ms × 2^10 = 102.4s → capped
//! assert_eq!(backoff.delay_after(11), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::error::RuntimeError;
use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0`).
    pub factor: f64,
    /// Randomization applied on top of the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1s`, `factor = 2.0`, no cap, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::MAX,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Exponential policy without jitter or cap: `first * factor^(n-1)`.
    pub fn exponential(first: Duration, factor: f64) -> Self {
        Self {
            first,
            factor,
            max: Duration::MAX,
            jitter: JitterPolicy::None,
        }
    }

    /// Rejects non-finite factors and factors below `1.0`.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(RuntimeError::invalid(format!(
                "backoff factor must be finite and >= 1.0, got {}",
                self.factor
            )));
        }
        Ok(())
    }

    /// Delay to wait after failed attempt `attempt` (1-based; `0` is treated as `1`).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max)
            .min(self.max);

        self.jitter.apply(base, self.first, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(first_ms: u64, max: Duration, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max,
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn grows_geometrically() {
        let p = policy(100, Duration::from_secs(30), 2.0);
        let delays: Vec<_> = (1..=5).map(|n| p.delay_after(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn attempt_zero_behaves_like_first() {
        let p = policy(250, Duration::from_secs(30), 3.0);
        assert_eq!(p.delay_after(0), p.delay_after(1));
    }

    #[test]
    fn constant_factor_keeps_delay() {
        let p = policy(500, Duration::from_secs(30), 1.0);
        for n in 1..10 {
            assert_eq!(p.delay_after(n), Duration::from_millis(500));
        }
    }

    #[test]
    fn clamps_to_max_and_survives_overflow() {
        let p = policy(100, Duration::from_secs(10), 2.0);
        assert_eq!(p.delay_after(40), Duration::from_secs(10));
        assert_eq!(p.delay_after(u32::MAX), Duration::from_secs(10));

        let p = policy(10_000, Duration::from_secs(5), 2.0);
        assert_eq!(p.delay_after(1), Duration::from_secs(5));
    }

    #[test]
    fn exponential_is_uncapped() {
        let p = BackoffPolicy::exponential(Duration::from_secs(40), 2.0);
        assert_eq!(p.delay_after(2), Duration::from_secs(80));
        assert_eq!(p.delay_after(5), Duration::from_secs(640));
        assert_eq!(p.delay_after(u32::MAX), Duration::MAX);
    }

    #[test]
    fn validate_rejects_shrinking_or_nan_factor() {
        assert!(policy(1, Duration::from_secs(1), 0.5).validate().is_err());
        assert!(policy(1, Duration::from_secs(1), f64::NAN).validate().is_err());
        assert!(policy(1, Duration::from_secs(1), 1.0).validate().is_ok());
    }
}
