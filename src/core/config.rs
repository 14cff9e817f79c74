//! # Station-wide configuration.
//!
//! Provides [`Config`] centralized settings for devices and the station.
//!
//! Config is used in two ways:
//! 1. **Station creation**: `Station::builder(config)`
//! 2. **Device construction**: every device takes `&Config` for its tolerances,
//!    timeouts and backoff.
//!
//! ## Sentinel values
//! - `kickoff_timeout = 0s` → syringe pump kickoffs wait indefinitely
//! - `sample_pump_kickoff_timeout = 0s` → sample pump kickoffs wait indefinitely

use std::time::Duration;

use crate::coordinator::DEFAULT_TOLERANCE;
use crate::policies::BackoffPolicy;

/// Configuration shared by every device of a station.
///
/// ## Field semantics
/// - `convergence_tolerance`: strict `|value − target| < tolerance` for accumulated output
/// - `kickoff_timeout`: syringe pump confirmation timeout (`0s` = none)
/// - `sample_pump_kickoff_timeout`: sample pump confirmation timeout (`0s` = none)
/// - `retry_backoff`: wait between a hardware fault and the re-issued write
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Tolerance for numeric convergence of accumulated output.
    pub convergence_tolerance: f64,

    /// How long a syringe pump may take to confirm a kickoff.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = kickoff resolves `Failed(Timeout)` when exceeded
    pub kickoff_timeout: Duration,

    /// How long a sample pump may take to report `Moving` after a slew command.
    pub sample_pump_kickoff_timeout: Duration,

    /// Backoff used by retry guards before re-issuing a faulted write.
    pub retry_backoff: BackoffPolicy,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl Config {
    /// Syringe pump kickoff timeout as an `Option`.
    #[inline]
    pub fn kickoff_timeout(&self) -> Option<Duration> {
        non_zero(self.kickoff_timeout)
    }

    /// Sample pump kickoff timeout as an `Option`.
    #[inline]
    pub fn sample_pump_kickoff_timeout(&self) -> Option<Duration> {
        non_zero(self.sample_pump_kickoff_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    if d == Duration::ZERO { None } else { Some(d) }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `convergence_tolerance = 0.015`
    /// - `kickoff_timeout = 0s` (wait for the hardware indefinitely)
    /// - `sample_pump_kickoff_timeout = 1.5s`
    /// - `retry_backoff = 5s constant`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            convergence_tolerance: DEFAULT_TOLERANCE,
            kickoff_timeout: Duration::ZERO,
            sample_pump_kickoff_timeout: Duration::from_millis(1500),
            retry_backoff: BackoffPolicy::default(),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_sentinels() {
        let cfg = Config::default();
        assert_eq!(cfg.kickoff_timeout(), None);
        assert_eq!(
            cfg.sample_pump_kickoff_timeout(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(cfg.retry_backoff.next(3), Duration::from_secs(5));

        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
