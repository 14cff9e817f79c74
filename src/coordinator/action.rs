//! # ActionCoordinator: one status, many watchers, one teardown.
//!
//! A coordinator owns an [`ActionStatus`] and every [`Subscription`] feeding
//! it. Watchers are attached to signal channels; each sees every notification
//! and decides on its own whether to resolve. The first resolution wins and
//! tears everything down.
//!
//! ## Architecture
//! ```text
//!  channel A ──notify──► watcher 1 ──┐
//!  channel A ──notify──► watcher 2 ──┼──► resolve_and_teardown(outcome)
//!  channel B ──notify──► watcher 3 ──┘            │
//!  timer (optional) ─────────────────────────────►│
//!                                                 ▼
//!                                 ActionStatus::resolve (first wins)
//!                                                 │ (status callback, exactly once)
//!                                                 ▼
//!                                            teardown()
//!                                  ├─► closed = true
//!                                  ├─► cancellation token → timers, retries abort
//!                                  └─► cancel every owned subscription
//! ```
//!
//! ## Rules
//! - Teardown is idempotent and safe from inside one of the watchers it cancels:
//!   the running watcher finishes, then no further deliveries reach any of them.
//! - A watcher attached after teardown is cancelled on the spot.
//! - Watchers hold the coordinator strongly; teardown (or [`detach_all`]) breaks
//!   the channel → watcher → coordinator cycle.
//!
//! [`detach_all`]: ActionCoordinator::detach_all

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;
use crate::events::{Bus, Event, EventKind};
use crate::signal::{Callback, Notification, Signal, Subscription};
use crate::status::{ActionStatus, Failure, Outcome};

/// Coordinator-local identifier of an attached watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

#[derive(Default)]
struct Watches {
    map: BTreeMap<WatchId, Subscription>,
    next: u64,
    closed: bool,
}

struct Inner {
    device: Arc<str>,
    status: ActionStatus,
    watches: Mutex<Watches>,
    token: CancellationToken,
    bus: Bus,
}

/// Owns one [`ActionStatus`] and the subscriptions feeding it.
///
/// Cheap to clone; clones share the same coordinator.
#[derive(Clone)]
pub struct ActionCoordinator {
    inner: Arc<Inner>,
}

impl ActionCoordinator {
    /// Creates a coordinator whose status is named `"{device}.{action}"`.
    pub fn new(device: &str, action: &str, bus: Bus) -> Self {
        let status = ActionStatus::new(format!("{device}.{action}"));
        let inner = Arc::new(Inner {
            device: Arc::from(device),
            status: status.clone(),
            watches: Mutex::new(Watches::default()),
            token: CancellationToken::new(),
            bus,
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        status.add_callback(move |outcome| {
            if let Some(inner) = weak.upgrade() {
                let me = ActionCoordinator { inner };
                me.publish_resolved(outcome);
                me.teardown();
            }
        });

        Self { inner }
    }

    /// The coordinated status.
    pub fn status(&self) -> ActionStatus {
        self.inner.status.clone()
    }

    /// Device this coordinator works for.
    pub fn device(&self) -> &str {
        &self.inner.device
    }

    /// Token cancelled on teardown; scheduled continuations select on it.
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// True once the coordinator tore down (resolved or detached).
    pub fn is_closed(&self) -> bool {
        self.inner.watches.lock().closed
    }

    /// Number of watchers still attached.
    pub fn watch_count(&self) -> usize {
        self.inner.watches.lock().map.len()
    }

    /// Subscribes `on_change` to `channel`.
    ///
    /// `on_change` is invoked on every notification and decides itself whether
    /// to call [`resolve_and_teardown`](Self::resolve_and_teardown).
    pub fn attach<F>(&self, channel: &dyn Signal, run_immediately: bool, on_change: F) -> WatchId
    where
        F: Fn(&ActionCoordinator, &Notification) + Send + Sync + 'static,
    {
        let me = self.clone();
        let callback: Callback = Arc::new(move |note: &Notification| {
            if me.is_closed() {
                return;
            }
            on_change(&me, note);
        });

        let id = {
            let mut w = self.inner.watches.lock();
            let id = WatchId(w.next);
            w.next += 1;
            id
        };

        let sub = channel.subscribe(callback, run_immediately);

        let rejected = {
            let mut w = self.inner.watches.lock();
            if w.closed {
                Some(sub)
            } else {
                w.map.insert(id, sub);
                None
            }
        };
        if let Some(sub) = rejected {
            sub.cancel();
        }

        tracing::trace!(device = %self.inner.device, channel = channel.name(), watch = id.0, "watcher attached");
        id
    }

    /// Convenience over [`attach`](Self::attach): resolves with whatever
    /// `predicate` returns `Some` for.
    pub fn attach_until<P>(&self, channel: &dyn Signal, predicate: P) -> WatchId
    where
        P: Fn(&Notification) -> Option<Outcome> + Send + Sync + 'static,
    {
        self.attach(channel, false, move |co, note| {
            if let Some(outcome) = predicate(note) {
                co.resolve_and_teardown(outcome);
            }
        })
    }

    /// Cancels a single watcher; returns `false` if it was already gone.
    pub fn detach(&self, id: WatchId) -> bool {
        let sub = self.inner.watches.lock().map.remove(&id);
        sub.is_some_and(|s| s.cancel())
    }

    /// Resolves the status (first wins), then cancels every owned watcher.
    ///
    /// Returns `true` only if this call performed the resolution.
    pub fn resolve_and_teardown(&self, outcome: Outcome) -> bool {
        let won = self.inner.status.resolve(outcome);
        self.teardown();
        won
    }

    /// Cancels every watcher and pending continuation **without** resolving.
    pub fn detach_all(&self) {
        self.teardown();
    }

    /// Arms a timer: if still pending after `duration`, resolves
    /// `Failed(Timeout)`.
    pub fn timeout(&self, duration: Duration) -> Result<(), ActionError> {
        let me = self.clone();
        self.schedule("timeout", async move {
            tokio::time::sleep(duration).await;
            let won = me.resolve_and_teardown(Outcome::failed(Failure::Timeout { after: duration }));
            if won {
                tracing::warn!(status = me.inner.status.name(), ?duration, "confirmation timed out");
                me.inner.bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_device(Arc::clone(&me.inner.device))
                        .with_action(me.inner.status.name())
                        .with_timeout(duration),
                );
            }
        })
    }

    /// Spawns `fut` on the current tokio runtime; it is dropped unfinished
    /// if the coordinator tears down first.
    pub fn schedule<F>(&self, what: &'static str, fut: F) -> Result<(), ActionError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| ActionError::NoRuntime { what })?;
        let token = self.inner.token.clone();
        handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        });
        Ok(())
    }

    /// Publishes an event tagged with this coordinator's device.
    pub fn publish(&self, ev: Event) {
        self.inner
            .bus
            .publish(ev.with_device(Arc::clone(&self.inner.device)));
    }

    fn teardown(&self) {
        let subs = {
            let mut w = self.inner.watches.lock();
            if w.closed {
                return;
            }
            w.closed = true;
            std::mem::take(&mut w.map)
        };
        self.inner.token.cancel();
        for sub in subs.values() {
            sub.cancel();
        }
        tracing::trace!(status = self.inner.status.name(), cancelled = subs.len(), "coordinator torn down");
    }

    fn publish_resolved(&self, outcome: &Outcome) {
        let mut ev = Event::new(EventKind::StatusResolved)
            .with_action(self.inner.status.name())
            .with_state(outcome.state());
        if let Some(failure) = outcome.failure() {
            ev = ev.with_reason(failure.to_string());
        }
        self.publish(ev);
    }
}

impl std::fmt::Debug for ActionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCoordinator")
            .field("status", &self.inner.status)
            .field("watches", &self.watch_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::coordinator::converged;
    use crate::signal::{SimSignal, Value};
    use crate::status::StatusState;

    fn coordinator() -> ActionCoordinator {
        ActionCoordinator::new("pump", "complete", Bus::default())
    }

    #[test]
    fn test_teardown_cancels_every_watcher() {
        let co = coordinator();
        let channels: Vec<SimSignal> = (0..4).map(|i| SimSignal::new(format!("ch{i}"), 0)).collect();
        for ch in &channels {
            co.attach(ch, false, |_, _| {});
        }
        assert_eq!(co.watch_count(), 4);

        assert!(co.resolve_and_teardown(Outcome::success()));
        assert_eq!(co.watch_count(), 0);
        assert!(co.is_closed());
        for ch in &channels {
            assert_eq!(ch.subscriber_count(), 0);
        }

        // Second teardown is a no-op.
        assert!(!co.resolve_and_teardown(Outcome::Cancelled));
        assert_eq!(co.status().state(), StatusState::Succeeded);
    }

    #[test]
    fn test_resolving_from_inside_a_watcher() {
        let co = coordinator();
        let ch = SimSignal::new("state", 0);
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            co.attach(&ch, false, move |co, note| {
                hits.fetch_add(1, Ordering::SeqCst);
                if note.new == Value::Int(1) {
                    co.resolve_and_teardown(Outcome::success());
                }
            });
        }

        ch.put(1);
        ch.put(2);
        // The first watcher resolved; its siblings were cancelled before delivery.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(co.status().state() == StatusState::Succeeded);
        assert_eq!(ch.subscriber_count(), 0);
    }

    #[test]
    fn test_external_resolution_also_tears_down() {
        let co = coordinator();
        let ch = SimSignal::new("state", 0);
        co.attach(&ch, false, |_, _| {});

        co.status().resolve(Outcome::failed(Failure::Stopped));
        assert!(co.is_closed());
        assert_eq!(ch.subscriber_count(), 0);
    }

    #[test]
    fn test_attach_after_teardown_is_cancelled() {
        let co = coordinator();
        co.resolve_and_teardown(Outcome::success());
        let ch = SimSignal::new("state", 0);
        co.attach(&ch, false, |_, _| panic!("must never run"));
        assert_eq!(ch.subscriber_count(), 0);
        ch.put(1);
    }

    #[test]
    fn test_run_immediately_may_resolve_during_attach() {
        let co = coordinator();
        let ch = SimSignal::new("delivered", 10.0);
        co.attach(&ch, true, |co, note| {
            if note.new.as_f64().is_some_and(|v| converged(v, 10.0, 0.015)) {
                co.resolve_and_teardown(Outcome::success());
            }
        });
        assert!(co.status().is_terminal());
        assert_eq!(ch.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_all_leaves_status_pending() {
        let co = coordinator();
        let ch = SimSignal::new("delay", 0.0);
        co.attach_until(&ch, |_| Some(Outcome::success()));
        co.detach_all();

        ch.put(1.0);
        assert!(!co.status().is_terminal());
        assert!(co.cancellation().is_cancelled());
    }

    #[test]
    fn test_timer_needs_runtime() {
        let err = coordinator().timeout(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.as_label(), "action_no_runtime");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_failed() {
        let co = coordinator();
        let ch = SimSignal::new("state", 0);
        co.attach(&ch, false, |_, _| {});
        co.timeout(Duration::from_millis(1500)).unwrap();

        let outcome = co.status().await;
        assert_eq!(
            outcome,
            Outcome::failed(Failure::Timeout {
                after: Duration::from_millis(1500)
            })
        );
        assert_eq!(ch.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_disarms_timer() {
        let co = coordinator();
        co.timeout(Duration::from_secs(1)).unwrap();
        co.resolve_and_teardown(Outcome::success());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(co.status().state(), StatusState::Succeeded);
    }

    /// Two watchers race on independent channels; exactly one resolution
    /// happens whichever fires first, and the loser never runs afterwards.
    #[test]
    fn test_disjunctive_watchers_any_order() {
        for state_first in [true, false] {
            let co = coordinator();
            let state = SimSignal::new("state", 1);
            let delivered = SimSignal::new("delivered", 0.0);
            let fired = Arc::new(Mutex::new(Vec::<&'static str>::new()));

            let f = Arc::clone(&fired);
            co.attach(&state, false, move |co, note| {
                if note.new == Value::Int(0) {
                    f.lock().push("state");
                    co.resolve_and_teardown(Outcome::success_with("state"));
                }
            });
            let f = Arc::clone(&fired);
            co.attach(&delivered, false, move |co, note| {
                if note.new.as_f64().is_some_and(|v| converged(v, 5.0, 0.015)) {
                    f.lock().push("delivered");
                    co.resolve_and_teardown(Outcome::success_with("delivered"));
                }
            });

            if state_first {
                state.put(0);
                delivered.put(5.0);
            } else {
                delivered.put(5.0);
                state.put(0);
            }

            let winner = if state_first { "state" } else { "delivered" };
            assert_eq!(*fired.lock(), vec![winner]);
            assert_eq!(co.status().outcome(), Some(Outcome::success_with(winner)));
        }
    }
}
