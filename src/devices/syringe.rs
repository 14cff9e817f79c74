//! # SyringePump: kickoff/complete over a state channel and a volume counter.
//!
//! The pump exposes a four-state enum channel, an accumulated-volume readback,
//! a `Run`/`Stop` command and the programmed infusion volume. Completion is
//! recognised two ways (whichever arrives first): the state drops back to
//! `Idle`, or the delivered volume converges on the programmed target.
//!
//! ## Flow
//! ```text
//! kickoff()
//!   ├─► kickoff slot busy? ─► Err(KickoffInFlight)
//!   ├─► target := infusion_volume
//!   ├─► coordinators: "kickoff" (+ optional timer) and "complete" (pre-armed)
//!   ├─► kickoff  ◄─ state:     Infusing|Withdrawing ─► Succeeded
//!   │                          Interrupted          ─► Failed(Interrupted)
//!   ├─► complete ◄─ state:     non-Idle → Idle      ─► Succeeded, kickoff slot cleared
//!   │                          Interrupted          ─► Failed(Interrupted), both slots cleared
//!   ├─► complete ◄─ delivered: |v − target| < tol   ─► kickoff + complete Succeeded
//!   └─► run := "Run" (last, after every watcher is armed)
//! ```
//!
//! ## Slot rules
//! - natural completion clears the kickoff slot; the completion slot stays so
//!   `complete()` still returns the resolved status;
//! - interruption clears both slots, so a later `complete()` is rejected;
//! - a timed-out kickoff keeps its slot until `stop()`.
//!
//! No lock is held while a signal is written or a status is resolved.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::Config;
use crate::coordinator::{ActionCoordinator, converged};
use crate::devices::flyer::{Device, Flyer, Phase};
use crate::error::{DeviceError, OrderingViolation};
use crate::events::{Bus, Event, EventKind};
use crate::signal::{Signal, StateLabel, StateTable, Value, read_f64};
use crate::status::{ActionStatus, Failure, Outcome};

/// Hardware states reported by the pump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpState {
    /// Not moving.
    Idle,
    /// Pushing fluid out.
    Infusing,
    /// Drawing fluid in.
    Withdrawing,
    /// Stalled or aborted by the hardware.
    Interrupted,
}

impl StateLabel for PumpState {
    const REQUIRED: &'static [Self] = &[
        PumpState::Idle,
        PumpState::Infusing,
        PumpState::Withdrawing,
        PumpState::Interrupted,
    ];

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "Idle" => Some(PumpState::Idle),
            "Infusing" => Some(PumpState::Infusing),
            "Withdrawing" => Some(PumpState::Withdrawing),
            "Interrupted" => Some(PumpState::Interrupted),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            PumpState::Idle => "Idle",
            PumpState::Infusing => "Infusing",
            PumpState::Withdrawing => "Withdrawing",
            PumpState::Interrupted => "Interrupted",
        }
    }
}

/// Channels of one syringe pump.
#[derive(Clone)]
pub struct PumpSignals {
    /// Enum state readback.
    pub state: Arc<dyn Signal>,
    /// Accumulated delivered volume.
    pub delivered: Arc<dyn Signal>,
    /// `Run` / `Stop` command.
    pub run: Arc<dyn Signal>,
    /// Programmed volume; read at kickoff as the completion target.
    pub infusion_volume: Arc<dyn Signal>,
}

#[derive(Default)]
struct Slots {
    kickoff: Option<ActionCoordinator>,
    completion: Option<ActionCoordinator>,
    /// Completion returned by `complete()`, tracked until it resolves.
    handed_out: Option<ActionCoordinator>,
}

struct Shared {
    name: Arc<str>,
    signals: PumpSignals,
    table: StateTable<PumpState>,
    tolerance: f64,
    timeout: Option<Duration>,
    bus: Bus,
    slots: Mutex<Slots>,
}

impl Shared {
    /// Clears slots after the completion `status` resolved on its own.
    ///
    /// Ignored when the slots already belong to another kickoff. A timed-out
    /// kickoff keeps its slot until `stop()`.
    fn release(&self, status: &ActionStatus, clear_completion: bool) {
        let mut slots = self.slots.lock();
        let current = slots
            .completion
            .as_ref()
            .is_some_and(|cp| cp.status().ptr_eq(status));
        if !current {
            return;
        }
        let timed_out = slots.kickoff.as_ref().is_some_and(|ko| {
            matches!(
                ko.status().outcome().as_ref().and_then(Outcome::failure),
                Some(Failure::Timeout { .. })
            )
        });
        if !timed_out {
            slots.kickoff = None;
        }
        if clear_completion {
            slots.completion = None;
        }
    }
}

/// Syringe pump driven through kickoff → complete.
pub struct SyringePump {
    shared: Arc<Shared>,
}

impl SyringePump {
    /// Creates a pump; fails if the state channel's label table does not map
    /// onto [`PumpState`].
    pub fn new(name: &str, signals: PumpSignals, cfg: &Config, bus: Bus) -> Result<Self, DeviceError> {
        let table = StateTable::from_signal(signals.state.as_ref())?;
        Ok(Self {
            shared: Arc::new(Shared {
                name: Arc::from(name),
                signals,
                table,
                tolerance: cfg.convergence_tolerance,
                timeout: cfg.kickoff_timeout(),
                bus,
                slots: Mutex::new(Slots::default()),
            }),
        })
    }

    fn arm_kickoff(&self, ko: &ActionCoordinator) {
        let table = self.shared.table.clone();
        ko.attach(self.shared.signals.state.as_ref(), false, move |co, note| {
            match table.decode(&note.new) {
                Ok(PumpState::Infusing | PumpState::Withdrawing) => {
                    if co.resolve_and_teardown(Outcome::success()) {
                        co.publish(Event::new(EventKind::KickoffConfirmed));
                    }
                }
                Ok(PumpState::Interrupted) => {
                    co.resolve_and_teardown(Outcome::failed(Failure::Interrupted {
                        state: PumpState::Interrupted.label(),
                    }));
                }
                Ok(PumpState::Idle) => {}
                Err(err) => {
                    tracing::warn!(device = co.device(), error = %err, "undecodable state");
                }
            }
        });
    }

    fn arm_completion(&self, cp: &ActionCoordinator, ko: &ActionCoordinator, target: f64) {
        let table = self.shared.table.clone();
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        cp.attach(self.shared.signals.state.as_ref(), false, move |co, note| {
            let (old, new) = match table.decode_change(note) {
                Ok(change) => change,
                Err(err) => {
                    tracing::warn!(device = co.device(), error = %err, "undecodable state");
                    return;
                }
            };
            if new == PumpState::Interrupted {
                tracing::warn!(device = co.device(), from = old.label(), "pump interrupted");
                co.publish(Event::new(EventKind::Interrupted).with_reason(new.label()));
                co.resolve_and_teardown(Outcome::failed(Failure::Interrupted { state: new.label() }));
                if let Some(shared) = weak.upgrade() {
                    shared.release(&co.status(), true);
                }
            } else if new == PumpState::Idle && old != PumpState::Idle {
                co.resolve_and_teardown(Outcome::success());
                if let Some(shared) = weak.upgrade() {
                    shared.release(&co.status(), false);
                }
            }
        });

        let ko = ko.clone();
        let tolerance = self.shared.tolerance;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        cp.attach(self.shared.signals.delivered.as_ref(), false, move |co, note| {
            let Some(value) = note.new.as_f64() else {
                return;
            };
            if !converged(value, target, tolerance) {
                return;
            }
            if ko.resolve_and_teardown(Outcome::success()) {
                co.publish(Event::new(EventKind::KickoffConfirmed).with_value(value));
            }
            co.resolve_and_teardown(Outcome::success_with(value));
            if let Some(shared) = weak.upgrade() {
                shared.release(&co.status(), false);
            }
        });
    }
}

impl Device for SyringePump {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn stop(&self, success: bool) -> Result<(), DeviceError> {
        let pending: Vec<ActionCoordinator> = {
            let mut slots = self.shared.slots.lock();
            [slots.kickoff.take(), slots.completion.take(), slots.handed_out.take()]
                .into_iter()
                .flatten()
                .collect()
        };

        let outcome = Outcome::forced(success);
        for co in &pending {
            co.resolve_and_teardown(outcome.clone());
        }

        tracing::debug!(device = %self.shared.name, success, forced = pending.len(), "stop");
        self.shared.bus.publish(
            Event::new(EventKind::StopIssued)
                .with_device(Arc::clone(&self.shared.name))
                .with_reason(if success { "success" } else { "failure" }),
        );
        self.shared.signals.run.write(Value::from("Stop"))?;
        Ok(())
    }

    fn as_flyer(&self) -> Option<&dyn Flyer> {
        Some(self)
    }
}

impl Flyer for SyringePump {
    fn kickoff(&self) -> Result<ActionStatus, DeviceError> {
        let shared = &self.shared;
        let (ko, cp, target) = {
            let mut slots = shared.slots.lock();
            let completing = slots.handed_out.as_ref().is_some_and(|cp| !cp.status().is_terminal());
            if slots.kickoff.is_some() || completing {
                return Err(DeviceError::ordering(&shared.name, OrderingViolation::KickoffInFlight));
            }
            let target = read_f64(shared.signals.infusion_volume.as_ref())?;
            let ko = ActionCoordinator::new(&shared.name, "kickoff", shared.bus.clone());
            let cp = ActionCoordinator::new(&shared.name, "complete", shared.bus.clone());
            if let Some(limit) = shared.timeout {
                ko.timeout(limit)?;
            }
            slots.kickoff = Some(ko.clone());
            slots.completion = Some(cp.clone());
            (ko, cp, target)
        };

        tracing::debug!(device = %shared.name, target, "kickoff");
        ko.publish(Event::new(EventKind::KickoffRequested).with_value(target));

        self.arm_kickoff(&ko);
        self.arm_completion(&cp, &ko, target);

        if let Err(err) = shared.signals.run.write(Value::from("Run")) {
            let failure = Failure::Hardware(err.to_string());
            ko.resolve_and_teardown(Outcome::failed(failure.clone()));
            cp.resolve_and_teardown(Outcome::failed(failure));
            shared.release(&cp.status(), true);
            return Err(err.into());
        }
        Ok(ko.status())
    }

    fn complete(&self) -> Result<ActionStatus, DeviceError> {
        let cp = {
            let mut slots = self.shared.slots.lock();
            let Some(cp) = slots.completion.take() else {
                return Err(DeviceError::ordering(
                    &self.shared.name,
                    OrderingViolation::CompleteWithoutKickoff,
                ));
            };
            slots.kickoff = None;
            slots.handed_out = Some(cp.clone());
            cp
        };
        cp.publish(Event::new(EventKind::CompleteRequested));
        Ok(cp.status())
    }

    fn phase(&self) -> Phase {
        let slots = self.shared.slots.lock();
        if let Some(ko) = &slots.kickoff {
            let confirmed = ko.status().outcome().is_some_and(|o| o.is_success());
            if !confirmed {
                return Phase::KickoffPending;
            }
            if slots.completion.as_ref().is_some_and(|cp| !cp.status().is_terminal()) {
                return Phase::Active;
            }
        }
        if slots.handed_out.as_ref().is_some_and(|cp| !cp.status().is_terminal()) {
            return Phase::CompletePending;
        }
        Phase::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SimSignal;
    use crate::status::StatusState;

    const LABELS: [&str; 4] = ["Idle", "Infusing", "Withdrawing", "Interrupted"];

    struct Bench {
        state: SimSignal,
        delivered: SimSignal,
        run: SimSignal,
        pump: SyringePump,
    }

    fn bench_with(cfg: &Config) -> Bench {
        let state = SimSignal::with_labels("State_RBV", LABELS, 0);
        let delivered = SimSignal::new("Delivered_RBV", 0.0);
        let run = SimSignal::new("Run", "Stop");
        let volume = SimSignal::new("InfusionVolume_RBV", 10.0);
        let pump = SyringePump::new(
            "syringe_pump",
            PumpSignals {
                state: state.shared(),
                delivered: delivered.shared(),
                run: run.shared(),
                infusion_volume: volume.shared(),
            },
            cfg,
            Bus::default(),
        )
        .unwrap();
        Bench {
            state,
            delivered,
            run,
            pump,
        }
    }

    fn bench() -> Bench {
        bench_with(&Config::default())
    }

    #[test]
    fn test_second_kickoff_is_rejected() {
        let b = bench();
        b.pump.kickoff().unwrap();
        let err = b.pump.kickoff().unwrap_err();
        assert_eq!(err.as_label(), "device_kickoff_in_flight");
        assert_eq!(b.run.writes(), vec![Value::from("Run")]);
    }

    #[test]
    fn test_kickoff_confirm_then_volume_converges() {
        let b = bench();
        let ko = b.pump.kickoff().unwrap();
        assert_eq!(b.pump.phase(), Phase::KickoffPending);

        b.state.put_index(1);
        assert_eq!(ko.state(), StatusState::Succeeded);
        assert_eq!(b.pump.phase(), Phase::Active);

        b.delivered.put(5.0);
        b.delivered.put(9.99);

        let cp = b.pump.complete().unwrap();
        assert_eq!(cp.outcome(), Some(Outcome::success_with(9.99)));
        assert_eq!(b.pump.phase(), Phase::Idle);
        assert_eq!(b.delivered.subscriber_count(), 0);
        assert_eq!(b.state.subscriber_count(), 0);

        b.pump.kickoff().unwrap();
    }

    #[test]
    fn test_interrupted_before_start_rejects_complete() {
        let b = bench();
        let ko = b.pump.kickoff().unwrap();

        b.state.put_index(3);
        assert_eq!(
            ko.outcome(),
            Some(Outcome::failed(Failure::Interrupted { state: "Interrupted" }))
        );

        let err = b.pump.complete().unwrap_err();
        assert_eq!(err.as_label(), "device_complete_without_kickoff");
        assert_eq!(b.pump.phase(), Phase::Idle);
        assert_eq!(b.state.subscriber_count(), 0);
    }

    #[test]
    fn test_state_back_to_idle_completes() {
        let b = bench();
        b.pump.kickoff().unwrap();
        b.state.put_index(2);
        let cp = b.pump.complete().unwrap();
        assert_eq!(b.pump.phase(), Phase::CompletePending);

        b.state.put_index(0);
        assert_eq!(cp.state(), StatusState::Succeeded);
        assert_eq!(b.pump.phase(), Phase::Idle);
    }

    #[test]
    fn test_volume_converging_first_resolves_both() {
        let b = bench();
        let ko = b.pump.kickoff().unwrap();

        b.delivered.put(10.0);
        assert_eq!(ko.state(), StatusState::Succeeded);
        let cp = b.pump.complete().unwrap();
        assert_eq!(cp.state(), StatusState::Succeeded);

        // A late state transition changes nothing.
        b.state.put_index(1);
        assert_eq!(b.state.subscriber_count(), 0);
    }

    #[test]
    fn test_stop_forces_pending_statuses() {
        let b = bench();
        let ko = b.pump.kickoff().unwrap();
        b.pump.stop(false).unwrap();

        assert_eq!(ko.outcome(), Some(Outcome::failed(Failure::Stopped)));
        assert_eq!(b.run.writes(), vec![Value::from("Run"), Value::from("Stop")]);
        assert!(b.pump.complete().unwrap_err().is_ordering_violation());
        assert_eq!(b.pump.phase(), Phase::Idle);
    }

    #[test]
    fn test_stop_never_overwrites_terminal_status() {
        let b = bench();
        let ko = b.pump.kickoff().unwrap();
        b.state.put_index(1);
        b.delivered.put(10.0);
        let cp = b.pump.complete().unwrap();

        b.pump.stop(false).unwrap();
        assert_eq!(ko.state(), StatusState::Succeeded);
        assert_eq!(cp.outcome(), Some(Outcome::success_with(10.0)));
    }

    #[test]
    fn test_failed_run_write_clears_slots() {
        let b = bench();
        b.run.fail_writes("no route");
        let err = b.pump.kickoff().unwrap_err();
        assert_eq!(err.as_label(), "signal_write_failed");
        assert_eq!(b.pump.phase(), Phase::Idle);
        assert_eq!(b.state.subscriber_count(), 0);

        b.run.heal();
        b.pump.kickoff().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_kickoff_timeout_holds_slot_until_stop() {
        let cfg = Config {
            kickoff_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        let b = bench_with(&cfg);
        let ko = b.pump.kickoff().unwrap();

        let outcome = ko.clone().await;
        assert_eq!(outcome.failure().map(Failure::as_label), Some("failure_timeout"));
        assert_eq!(b.pump.phase(), Phase::KickoffPending);
        assert!(b.pump.kickoff().unwrap_err().is_ordering_violation());

        b.pump.stop(false).unwrap();
        assert_eq!(b.pump.phase(), Phase::Idle);
        b.pump.kickoff().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_kickoff_survives_natural_completion() {
        let cfg = Config {
            kickoff_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        let b = bench_with(&cfg);
        let ko = b.pump.kickoff().unwrap();
        assert_eq!(ko.clone().await.failure().map(Failure::as_label), Some("failure_timeout"));

        b.state.put_index(1);
        b.state.put_index(0);
        assert!(b.pump.kickoff().unwrap_err().is_ordering_violation());

        b.pump.stop(false).unwrap();
        b.pump.kickoff().unwrap();
    }

    #[test]
    fn test_kickoff_rejected_while_completion_pending() {
        let b = bench();
        b.pump.kickoff().unwrap();
        b.state.put_index(1);

        let cp = b.pump.complete().unwrap();
        assert!(!cp.is_terminal());
        assert_eq!(b.pump.phase(), Phase::CompletePending);
        let err = b.pump.kickoff().unwrap_err();
        assert_eq!(err.as_label(), "device_kickoff_in_flight");

        b.state.put_index(0);
        assert!(cp.outcome().is_some_and(|o| o.is_success()));
        b.pump.kickoff().unwrap();
    }

    #[test]
    fn test_label_table_is_validated() {
        let state = SimSignal::with_labels("State_RBV", ["Idle", "Infusing", "Withdrawing"], 0);
        let other = SimSignal::new("x", 0.0);
        let result = SyringePump::new(
            "p",
            PumpSignals {
                state: state.shared(),
                delivered: other.shared(),
                run: other.shared(),
                infusion_volume: other.shared(),
            },
            &Config::default(),
            Bus::default(),
        );
        let err = result.err().unwrap();
        assert_eq!(err.as_label(), "signal_missing_variant");
    }
}
