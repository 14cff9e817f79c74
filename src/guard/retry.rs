//! # RetryGuard: conditioned set with automatic re-issue on hardware faults.
//!
//! Some actuators accept a setpoint write, report success, and then silently
//! fail to apply it. They expose two fault channels:
//! - `fault`: the device failed to reach the value (alarm on the readback),
//! - `write_fault`: the write command itself failed.
//!
//! The guard verifies every `set` by readback and re-issues writes on fault.
//!
//! ## Flow
//! ```text
//! set(target)
//!   ├─► readback == target ─► Succeeded immediately (no hardware round trip)
//!   └─► coordinator "set":
//!         ├─ readback watcher:    retrying? ─► ignore
//!         │                       is_close(v, target) ─► Succeeded(v), teardown
//!         ├─ fault watcher:       truthy && !retrying ─► retrying = true
//!         │                         └─► [wait] write 0 ─► [wait] retrying = false ─► write target
//!         ├─ write-fault watcher: truthy ─► [wait] re-issue current setpoint
//!         └─► write target (last, after every watcher is armed)
//! ```
//!
//! ## Rules
//! - Waits are scheduled continuations on the tokio runtime, never thread
//!   sleeps; they are dropped when the coordinator tears down.
//! - One reset-then-retry sequence per fault episode: faults arriving while a
//!   sequence is in progress are ignored.
//! - The write-fault path has **no** re-entrancy flag; two faults schedule two
//!   re-issues.
//! - [`RetryGuard::stop`] detaches every watcher and leaves the pending status
//!   unresolved.
//! - A new `set` supersedes a pending one: the old status resolves `Cancelled`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::coordinator::{ActionCoordinator, is_close};
use crate::error::{DeviceError, SignalError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::signal::{Signal, Value, read_f64};
use crate::status::{ActionStatus, Failure, Outcome};

/// Channels a [`RetryGuard`] drives and observes.
#[derive(Clone)]
pub struct GuardSignals {
    /// Writable setpoint.
    pub setpoint: Arc<dyn Signal>,
    /// Readback of the applied value.
    pub readback: Arc<dyn Signal>,
    /// Alarm raised when the value was not applied.
    pub fault: Arc<dyn Signal>,
    /// Alarm raised when the write command failed.
    pub write_fault: Arc<dyn Signal>,
}

/// Write-and-verify wrapper that re-issues writes after hardware faults.
pub struct RetryGuard {
    device: Arc<str>,
    signals: GuardSignals,
    backoff: BackoffPolicy,
    bus: Bus,
    pending: Mutex<Option<ActionCoordinator>>,
}

impl RetryGuard {
    /// Creates a guard for `device`.
    pub fn new(device: &str, signals: GuardSignals, backoff: BackoffPolicy, bus: Bus) -> Self {
        Self {
            device: Arc::from(device),
            signals,
            backoff,
            bus,
            pending: Mutex::new(None),
        }
    }

    /// Status of the `set` currently in flight, if any.
    pub fn pending(&self) -> Option<ActionStatus> {
        self.pending
            .lock()
            .as_ref()
            .filter(|co| !co.is_closed())
            .map(ActionCoordinator::status)
    }

    /// Writes `target` and verifies it by readback.
    ///
    /// Returns a status that succeeds (payload: the converged readback) once
    /// the readback matches. Transport errors on the initial write are
    /// returned synchronously and fail the status.
    pub fn set(&self, target: f64) -> Result<ActionStatus, DeviceError> {
        let current = read_f64(self.signals.readback.as_ref())?;

        let previous = self.pending.lock().take();
        if let Some(previous) = previous {
            previous.resolve_and_teardown(Outcome::Cancelled);
        }

        if current == target {
            tracing::debug!(device = %self.device, target, "readback already at target");
            return Ok(ActionStatus::done(
                format!("{}.set", self.device),
                Outcome::success_with(current),
            ));
        }

        let co = ActionCoordinator::new(&self.device, "set", self.bus.clone());
        let retrying = Arc::new(AtomicBool::new(false));

        self.arm_readback(&co, target, Arc::clone(&retrying));
        self.arm_fault(&co, target, retrying);
        self.arm_write_fault(&co);

        *self.pending.lock() = Some(co.clone());

        if let Err(err) = self.signals.setpoint.write(Value::Float(target)) {
            co.resolve_and_teardown(Outcome::failed(Failure::Hardware(err.to_string())));
            return Err(err.into());
        }
        Ok(co.status())
    }

    /// Detaches every watcher without resolving the pending status.
    pub fn stop(&self) {
        let pending = self.pending.lock().take();
        if let Some(co) = pending {
            tracing::debug!(device = %self.device, "retry guard stopped; status left pending");
            co.detach_all();
        }
    }

    fn arm_readback(&self, co: &ActionCoordinator, target: f64, retrying: Arc<AtomicBool>) {
        co.attach(self.signals.readback.as_ref(), false, move |co, note| {
            if retrying.load(Ordering::Acquire) {
                return;
            }
            if let Some(value) = note.new.as_f64().filter(|v| is_close(*v, target)) {
                co.resolve_and_teardown(Outcome::success_with(value));
            }
        });
    }

    fn arm_fault(&self, co: &ActionCoordinator, target: f64, retrying: Arc<AtomicBool>) {
        let setpoint = Arc::clone(&self.signals.setpoint);
        let fault_name = self.signals.fault.name().to_string();
        let backoff = self.backoff;
        let episodes = Arc::new(AtomicU32::new(0));

        co.attach(self.signals.fault.as_ref(), false, move |co, note| {
            if !note.new.is_truthy() {
                return;
            }
            co.publish(
                Event::new(EventKind::FaultObserved).with_reason(format!("{fault_name}={}", note.new)),
            );
            if retrying.swap(true, Ordering::AcqRel) {
                return;
            }

            let episode = episodes.fetch_add(1, Ordering::Relaxed);
            let delay = backoff.next(episode);
            tracing::warn!(device = co.device(), fault = %note.new, ?delay, "write fault; reset then retry");
            co.publish(
                Event::new(EventKind::RetryScheduled)
                    .with_attempt(episode + 1)
                    .with_delay(delay)
                    .with_reason("reset-then-retry"),
            );

            let sequence = {
                let co = co.clone();
                let setpoint = Arc::clone(&setpoint);
                let retrying = Arc::clone(&retrying);
                async move {
                    tokio::time::sleep(delay).await;
                    reissue(&co, setpoint.as_ref(), 0.0, episode + 1);
                    tokio::time::sleep(delay).await;
                    retrying.store(false, Ordering::Release);
                    reissue(&co, setpoint.as_ref(), target, episode + 1);
                }
            };
            if let Err(err) = co.schedule("reset-then-retry", sequence) {
                retrying.store(false, Ordering::Release);
                tracing::warn!(device = co.device(), error = %err, "retry not scheduled");
            }
        });
    }

    fn arm_write_fault(&self, co: &ActionCoordinator) {
        let setpoint = Arc::clone(&self.signals.setpoint);
        let backoff = self.backoff;
        let episodes = Arc::new(AtomicU32::new(0));

        co.attach(self.signals.write_fault.as_ref(), false, move |co, note| {
            if !note.new.is_truthy() {
                return;
            }
            let episode = episodes.fetch_add(1, Ordering::Relaxed);
            let delay = backoff.next(episode);
            tracing::warn!(device = co.device(), fault = %note.new, ?delay, "write command failed; re-issuing");
            co.publish(
                Event::new(EventKind::RetryScheduled)
                    .with_attempt(episode + 1)
                    .with_delay(delay)
                    .with_reason("re-issue"),
            );

            let reissue_current = {
                let co = co.clone();
                let setpoint = Arc::clone(&setpoint);
                async move {
                    tokio::time::sleep(delay).await;
                    match read_f64(setpoint.as_ref()) {
                        Ok(value) => reissue(&co, setpoint.as_ref(), value, episode + 1),
                        Err(err) => publish_write_failed(&co, &err),
                    }
                }
            };
            if let Err(err) = co.schedule("re-issue", reissue_current) {
                tracing::warn!(device = co.device(), error = %err, "re-issue not scheduled");
            }
        });
    }
}

fn reissue(co: &ActionCoordinator, setpoint: &dyn Signal, value: f64, episode: u32) {
    match setpoint.write(Value::Float(value)) {
        Ok(()) => co.publish(
            Event::new(EventKind::WriteReissued)
                .with_value(value)
                .with_attempt(episode),
        ),
        Err(err) => publish_write_failed(co, &err),
    }
}

fn publish_write_failed(co: &ActionCoordinator, err: &SignalError) {
    tracing::warn!(device = co.device(), error = %err, "re-issued write failed");
    co.publish(Event::new(EventKind::WriteFailed).with_reason(err.to_string()));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::signal::SimSignal;
    use crate::status::StatusState;

    struct Bench {
        setpoint: SimSignal,
        readback: SimSignal,
        fault: SimSignal,
        write_fault: SimSignal,
        guard: RetryGuard,
    }

    fn bench(readback: f64) -> Bench {
        let setpoint = SimSignal::new("exp_time", readback);
        let readback = SimSignal::new("delay", readback);
        let fault = SimSignal::new("delay_status", 0);
        let write_fault = SimSignal::new("exp_time_status", 0);
        let guard = RetryGuard::new(
            "dg",
            GuardSignals {
                setpoint: setpoint.shared(),
                readback: readback.shared(),
                fault: fault.shared(),
                write_fault: write_fault.shared(),
            },
            BackoffPolicy::constant(Duration::from_secs(5)),
            Bus::default(),
        );
        Bench {
            setpoint,
            readback,
            fault,
            write_fault,
            guard,
        }
    }

    fn floats(values: Vec<Value>) -> Vec<f64> {
        values.iter().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn test_short_circuit_when_already_at_target() {
        let b = bench(0.25);
        let st = b.guard.set(0.25).unwrap();
        assert_eq!(st.outcome(), Some(Outcome::success_with(0.25)));
        assert!(b.setpoint.writes().is_empty());
        assert_eq!(b.readback.subscriber_count(), 0);
    }

    #[test]
    fn test_readback_convergence_tears_down_all_watchers() {
        let b = bench(0.0);
        let st = b.guard.set(0.5).unwrap();
        assert_eq!(floats(b.setpoint.writes()), vec![0.5]);
        assert_eq!(b.fault.subscriber_count(), 1);

        b.readback.put(0.2);
        assert!(!st.is_terminal());
        b.readback.put(0.5);

        assert_eq!(st.outcome(), Some(Outcome::success_with(0.5)));
        assert_eq!(b.readback.subscriber_count(), 0);
        assert_eq!(b.fault.subscriber_count(), 0);
        assert_eq!(b.write_fault.subscriber_count(), 0);
        assert!(b.guard.pending().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_during_retry_does_not_overlap() {
        let b = bench(0.0);
        let st = b.guard.set(5.0).unwrap();
        b.setpoint.clear_writes();

        b.fault.put(1);
        b.fault.put(0);
        b.fault.put(2);
        b.fault.put(1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(floats(b.setpoint.writes()), vec![0.0, 5.0]);

        // Next episode gets its own reset-then-retry.
        b.fault.put(0);
        b.fault.put(1);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(floats(b.setpoint.writes()), vec![0.0, 5.0, 0.0, 5.0]);

        b.readback.put(5.0);
        assert_eq!(st.state(), StatusState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readback_ignored_while_retrying() {
        let b = bench(0.0);
        let st = b.guard.set(5.0).unwrap();

        b.fault.put(1);
        b.readback.put(5.0);
        assert!(!st.is_terminal());

        tokio::time::sleep(Duration::from_secs(11)).await;
        b.readback.put(5.0);
        assert!(st.outcome().unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_fault_reissues_without_guard() {
        let b = bench(0.0);
        let _st = b.guard.set(2.0).unwrap();
        b.setpoint.clear_writes();

        b.write_fault.put(1);
        b.write_fault.put(0);
        b.write_fault.put(1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(floats(b.setpoint.writes()), vec![2.0, 2.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_detaches_and_cancels_pending_retry() {
        let b = bench(0.0);
        let st = b.guard.set(3.0).unwrap();
        b.setpoint.clear_writes();

        b.fault.put(1);
        b.guard.stop();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(b.setpoint.writes().is_empty());
        assert_eq!(b.readback.subscriber_count(), 0);
        assert_eq!(b.fault.subscriber_count(), 0);
        assert!(!st.is_terminal());
    }

    #[test]
    fn test_new_set_supersedes_pending_one() {
        let b = bench(0.0);
        let first = b.guard.set(1.0).unwrap();
        let second = b.guard.set(2.0).unwrap();

        assert_eq!(first.state(), StatusState::Cancelled);
        b.readback.put(2.0);
        assert_eq!(second.state(), StatusState::Succeeded);
    }

    #[test]
    fn test_superseded_callback_may_reenter_guard() {
        let b = bench(0.0);
        let guard = Arc::new(b.guard);
        let first = guard.set(1.0).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let weak = Arc::downgrade(&guard);
        let slot = Arc::clone(&seen);
        first.add_callback(move |_| {
            if let Some(guard) = weak.upgrade() {
                *slot.lock() = Some(guard.pending().is_some());
            }
        });

        let second = guard.set(2.0).unwrap();
        assert_eq!(first.state(), StatusState::Cancelled);
        assert_eq!(*seen.lock(), Some(false));
        assert!(guard.pending().is_some_and(|s| s.ptr_eq(&second)));
    }

    #[test]
    fn test_failed_initial_write_is_reported() {
        let b = bench(0.0);
        b.setpoint.fail_writes("link down");
        let err = b.guard.set(1.0).unwrap_err();
        assert_eq!(err.as_label(), "signal_write_failed");
        assert_eq!(b.readback.subscriber_count(), 0);
        assert!(b.guard.pending().is_none());
    }
}
