//! # Backoff policy for re-issuing faulted writes.
//!
//! [`BackoffPolicy`] controls how long a retry guard waits after a hardware
//! fault before touching the setpoint again. It is parameterized by:
//! - [`BackoffPolicy::first`] the wait for the first fault episode;
//! - [`BackoffPolicy::factor`] the multiplicative growth per further episode;
//! - [`BackoffPolicy::max`] the cap.
//!
//! The wait for episode `n` (0-indexed) is `first × factor^n`, clamped to
//! `max`. Delay generators need a constant settle time, which is the default
//! (`factor = 1.0`, 5 s).
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use flyvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(4),
//!     factor: 2.0,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(500));
//! assert_eq!(backoff.next(1), Duration::from_secs(1));
//! assert_eq!(backoff.next(10), Duration::from_secs(4));
//! ```

use std::time::Duration;

/// Wait policy between a fault and the re-issued write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Wait after the first fault episode.
    pub first: Duration,
    /// Cap on any single wait.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant).
    pub factor: f64,
}

impl Default for BackoffPolicy {
    /// Constant 5 s settle time (`first = max = 5s`, `factor = 1.0`).
    fn default() -> Self {
        Self::constant(Duration::from_secs(5))
    }
}

impl BackoffPolicy {
    /// Same wait for every episode.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
        }
    }

    /// Computes the wait for the given fault episode (0-indexed).
    ///
    /// Non-finite or negative intermediate results clamp to [`BackoffPolicy::max`].
    pub fn next(&self, episode: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = episode.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
