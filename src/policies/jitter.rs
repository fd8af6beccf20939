//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that many call sites
//! failing against the same upstream (rate limiting, a restarting server) do not
//! retry in lockstep.
//!
//! - [`JitterPolicy::None`] — exact delays
//! - [`JitterPolicy::Full`] — random delay in `[0, base]`
//! - [`JitterPolicy::Equal`] — `base/2 + random[0, base/2]`
//! - [`JitterPolicy::Decorrelated`] — random delay in `[floor, base * 3]`, capped

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use the exact backoff delay (default).
    #[default]
    None,
    /// Full jitter: random delay in `[0, base]`.
    Full,
    /// Equal jitter: `base/2 + random[0, base/2]`.
    Equal,
    /// Decorrelated jitter: random delay in `[floor, base * 3]`, capped at `max`.
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `base`.
    ///
    /// `floor` and `max` bound the decorrelated variant; the other variants never
    /// exceed `base`.
    pub fn apply(&self, base: Duration, floor: Duration, max: Duration) -> Duration {
        let base_ms = millis(base);
        if base_ms == 0 {
            return base;
        }
        let mut rng = rand::rng();

        match self {
            JitterPolicy::None => base,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=base_ms)),
            JitterPolicy::Equal => {
                let half = base_ms / 2;
                let extra = if half == 0 {
                    0
                } else {
                    rng.random_range(0..=half)
                };
                Duration::from_millis(half + extra)
            }
            JitterPolicy::Decorrelated => {
                let floor_ms = millis(floor.min(max));
                let upper = base_ms
                    .saturating_mul(3)
                    .min(millis(max))
                    .max(floor_ms);
                if floor_ms >= upper {
                    return Duration::from_millis(floor_ms);
                }
                Duration::from_millis(rng.random_range(floor_ms..=upper))
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
