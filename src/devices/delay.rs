//! # DelayGenerator: guarded delay setpoint plus a single-shot trigger.
//!
//! The delay setpoint occasionally fails to apply; every `set` goes through a
//! [`RetryGuard`] that verifies by readback and re-issues the write after a
//! fault.

use std::sync::Arc;

use crate::core::Config;
use crate::devices::flyer::Device;
use crate::error::DeviceError;
use crate::events::Bus;
use crate::guard::{GuardSignals, RetryGuard};
use crate::signal::{Signal, Value};
use crate::status::ActionStatus;

/// Channels of one delay generator.
#[derive(Clone)]
pub struct DelaySignals {
    /// Delay setpoint, its readback and both alarm channels.
    pub delay: GuardSignals,
    /// Single-shot trigger.
    pub fire: Arc<dyn Signal>,
}

/// Delay generator with a fault-tolerant delay setpoint.
pub struct DelayGenerator {
    name: Arc<str>,
    guard: RetryGuard,
    fire: Arc<dyn Signal>,
}

impl DelayGenerator {
    /// Creates a generator whose retries wait `cfg.retry_backoff`.
    pub fn new(name: &str, signals: DelaySignals, cfg: &Config, bus: Bus) -> Self {
        Self {
            name: Arc::from(name),
            guard: RetryGuard::new(name, signals.delay, cfg.retry_backoff, bus),
            fire: signals.fire,
        }
    }

    /// Sets the delay; resolves once the readback confirms it.
    pub fn set(&self, delay: f64) -> Result<ActionStatus, DeviceError> {
        tracing::debug!(device = %self.name, delay, "set delay");
        self.guard.set(delay)
    }

    /// Status of the `set` still being verified, if any.
    pub fn pending(&self) -> Option<ActionStatus> {
        self.guard.pending()
    }

    /// Emits one trigger pulse.
    pub fn fire(&self) -> Result<(), DeviceError> {
        self.fire.write(Value::Int(1))?;
        Ok(())
    }
}

impl Device for DelayGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    /// Detaches the guard's watchers; a pending `set` stays unresolved.
    fn stop(&self, _success: bool) -> Result<(), DeviceError> {
        self.guard.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SimSignal;
    use crate::status::StatusState;

    #[test]
    fn test_set_fire_and_stop() {
        let exp_time = SimSignal::new("bDelaySetAO", 0.0);
        let delay = SimSignal::new("bDelayAI", 0.0);
        let fire = SimSignal::new("genSingleShotTrigBO", 0);
        let dg = DelayGenerator::new(
            "dg",
            DelaySignals {
                delay: GuardSignals {
                    setpoint: exp_time.shared(),
                    readback: delay.shared(),
                    fault: SimSignal::new("bDelayAI.STAT", 0).shared(),
                    write_fault: SimSignal::new("bDelaySetAO.STAT", 0).shared(),
                },
                fire: fire.shared(),
            },
            &Config::default(),
            Bus::default(),
        );

        let st = dg.set(0.002).unwrap();
        delay.put(0.002);
        assert_eq!(st.state(), StatusState::Succeeded);

        dg.fire().unwrap();
        assert_eq!(fire.writes(), vec![Value::Int(1)]);

        let st = dg.set(0.004).unwrap();
        dg.stop(false).unwrap();
        assert!(dg.pending().is_none());
        delay.put(0.004);
        assert!(!st.is_terminal());
        assert!(dg.as_flyer().is_none());
    }
}
