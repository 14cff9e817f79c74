//! # SamplePump: slew/stop flyer with a confirmation timeout.
//!
//! ```text
//! kickoff()  ─► "kickoff" coordinator, timer (1.5 s default)
//!               sts == Moving ─► Succeeded       timer ─► Failed(Timeout)
//!               slew_cmd := 1 (last)
//! complete() ─► "complete" coordinator
//!               sts == Stopped ─► Succeeded
//!               stop_cmd := 1 (last)
//! stop()     ─► force-resolve pending, stop_cmd := 1
//! ```
//!
//! A kickoff stays in flight until `complete()` or `stop()`, also when it
//! timed out.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::Config;
use crate::coordinator::ActionCoordinator;
use crate::devices::flyer::{Device, Flyer, Phase};
use crate::error::{DeviceError, OrderingViolation};
use crate::events::{Bus, Event, EventKind};
use crate::signal::{Signal, StateLabel, StateTable, Value};
use crate::status::{ActionStatus, Failure, Outcome};

/// Motion flag reported by the sample pump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleState {
    /// Motor at rest.
    Stopped,
    /// Motor slewing.
    Moving,
}

impl StateLabel for SampleState {
    const REQUIRED: &'static [Self] = &[SampleState::Stopped, SampleState::Moving];

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "Stopped" => Some(SampleState::Stopped),
            "Moving" => Some(SampleState::Moving),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SampleState::Stopped => "Stopped",
            SampleState::Moving => "Moving",
        }
    }
}

/// Channels of one sample pump.
#[derive(Clone)]
pub struct SampleSignals {
    /// Enum motion flag.
    pub sts: Arc<dyn Signal>,
    /// Start slewing.
    pub slew_cmd: Arc<dyn Signal>,
    /// Stop slewing.
    pub stop_cmd: Arc<dyn Signal>,
}

#[derive(Default)]
struct Slots {
    kickoff: Option<ActionCoordinator>,
    completion: Option<ActionCoordinator>,
}

/// Sample pump driven through kickoff → complete.
pub struct SamplePump {
    name: Arc<str>,
    signals: SampleSignals,
    table: StateTable<SampleState>,
    timeout: Option<Duration>,
    bus: Bus,
    slots: Mutex<Slots>,
}

impl SamplePump {
    /// Creates a sample pump; fails if `sts` does not map onto [`SampleState`].
    pub fn new(name: &str, signals: SampleSignals, cfg: &Config, bus: Bus) -> Result<Self, DeviceError> {
        let table = StateTable::from_signal(signals.sts.as_ref())?;
        Ok(Self {
            name: Arc::from(name),
            signals,
            table,
            timeout: cfg.sample_pump_kickoff_timeout(),
            bus,
            slots: Mutex::new(Slots::default()),
        })
    }

    fn arm_until(&self, co: &ActionCoordinator, wanted: SampleState) {
        let table = self.table.clone();
        co.attach(self.signals.sts.as_ref(), false, move |co, note| {
            match table.decode(&note.new) {
                Ok(state) if state == wanted => {
                    co.resolve_and_teardown(Outcome::success());
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(device = co.device(), error = %err, "undecodable motion flag");
                }
            }
        });
    }

    fn issue(&self, co: &ActionCoordinator, command: &dyn Signal) -> Result<(), DeviceError> {
        if let Err(err) = command.write(Value::Int(1)) {
            co.resolve_and_teardown(Outcome::failed(Failure::Hardware(err.to_string())));
            return Err(err.into());
        }
        Ok(())
    }
}

impl Device for SamplePump {
    fn name(&self) -> &str {
        &self.name
    }

    fn stop(&self, success: bool) -> Result<(), DeviceError> {
        let pending: Vec<ActionCoordinator> = {
            let mut slots = self.slots.lock();
            [slots.kickoff.take(), slots.completion.take()]
                .into_iter()
                .flatten()
                .collect()
        };
        let outcome = Outcome::forced(success);
        for co in &pending {
            co.resolve_and_teardown(outcome.clone());
        }

        self.bus.publish(
            Event::new(EventKind::StopIssued)
                .with_device(Arc::clone(&self.name))
                .with_reason(if success { "success" } else { "failure" }),
        );
        self.signals.stop_cmd.write(Value::Int(1))?;
        Ok(())
    }

    fn as_flyer(&self) -> Option<&dyn Flyer> {
        Some(self)
    }
}

impl Flyer for SamplePump {
    fn kickoff(&self) -> Result<ActionStatus, DeviceError> {
        let ko = {
            let mut slots = self.slots.lock();
            if slots.kickoff.is_some() {
                return Err(DeviceError::ordering(&self.name, OrderingViolation::KickoffInFlight));
            }
            let ko = ActionCoordinator::new(&self.name, "kickoff", self.bus.clone());
            if let Some(limit) = self.timeout {
                ko.timeout(limit)?;
            }
            slots.kickoff = Some(ko.clone());
            slots.completion = None;
            ko
        };

        tracing::debug!(device = %self.name, timeout = ?self.timeout, "slew");
        ko.publish(Event::new(EventKind::KickoffRequested));
        self.arm_until(&ko, SampleState::Moving);

        if let Err(err) = self.issue(&ko, self.signals.slew_cmd.as_ref()) {
            let mut slots = self.slots.lock();
            if slots.kickoff.as_ref().is_some_and(|k| k.status().ptr_eq(&ko.status())) {
                slots.kickoff = None;
            }
            return Err(err);
        }
        Ok(ko.status())
    }

    fn complete(&self) -> Result<ActionStatus, DeviceError> {
        let cp = {
            let mut slots = self.slots.lock();
            if slots.kickoff.take().is_none() {
                return Err(DeviceError::ordering(
                    &self.name,
                    OrderingViolation::CompleteWithoutKickoff,
                ));
            }
            let cp = ActionCoordinator::new(&self.name, "complete", self.bus.clone());
            slots.completion = Some(cp.clone());
            cp
        };

        cp.publish(Event::new(EventKind::CompleteRequested));
        self.arm_until(&cp, SampleState::Stopped);
        self.issue(&cp, self.signals.stop_cmd.as_ref())?;
        Ok(cp.status())
    }

    fn phase(&self) -> Phase {
        let slots = self.slots.lock();
        match (&slots.kickoff, &slots.completion) {
            (Some(ko), _) if ko.status().outcome().is_some_and(|o| o.is_success()) => Phase::Active,
            (Some(_), _) => Phase::KickoffPending,
            (None, Some(cp)) if !cp.status().is_terminal() => Phase::CompletePending,
            _ => Phase::Idle,
        }
    }
}
