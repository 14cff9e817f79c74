//! # flyvisor
//!
//! **Flyvisor** drives hardware actuators (pumps, delay generators) through a
//! *kickoff → complete* lifecycle on top of signal-change notifications.
//!
//! Every asynchronous hardware action is represented by an [`ActionStatus`]
//! that resolves exactly once. An [`ActionCoordinator`] owns that status and
//! every signal subscription feeding it; whichever watcher resolves first
//! wins, and all the others are cancelled in the same step. A [`RetryGuard`]
//! adds fault-tolerant write-and-verify for setpoints that silently fail to
//! apply.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   sequencing code
//!        │ kickoff() / complete() / stop(success)
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Device (SyringePump, SamplePump, DelayGenerator)                 │
//! │  - kickoff / completion slots (ordering rules)                    │
//! │  - StateTable (typed decoding of enum channels)                   │
//! └──────┬──────────────────────────┬─────────────────────────┬───────┘
//!        ▼                          ▼                         ▼
//!  ┌───────────────┐        ┌───────────────┐          ┌──────────────┐
//!  │ Coordinator   │        │ Coordinator   │          │ RetryGuard   │
//!  │  "kickoff"    │        │  "complete"   │          │  "set"       │
//!  │ + timer       │        │               │          │ + backoff    │
//!  └┬──────────────┘        └┬─────────────┬┘          └┬─────────────┘
//!   │ watchers               │ watchers    │            │ watchers
//!   ▼                        ▼             ▼            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │           Signal channels (read / write / subscribe)              │
//! └───────────────────────────────────────────────────────────────────┘
//!
//! Coordinators, guards and devices publish Events ──► Bus ──► SubscriberSet
//!                                                               ├─► LogWriter
//!                                                               └─► custom Subscribe
//! ```
//!
//! ### Resolution
//! ```text
//! notification ──► watcher ──► resolve_and_teardown(outcome)
//!                                 ├─► ActionStatus::resolve  (first wins; later calls no-op)
//!                                 ├─► callbacks / awaiting tasks woken
//!                                 └─► every subscription and timer of the coordinator cancelled
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Statuses**      | One-shot resolvable action results, awaitable or callback-driven.  | [`ActionStatus`], [`Outcome`], [`Failure`]  |
//! | **Coordination**  | Subscription arenas with first-wins resolution and teardown.       | [`ActionCoordinator`]                       |
//! | **Retry**         | Write-and-verify with reset-then-retry on hardware faults.         | [`RetryGuard`], [`BackoffPolicy`]           |
//! | **Devices**       | Kickoff/complete flyers and guarded setpoints.                     | [`Flyer`], [`Device`], [`SyringePump`]      |
//! | **Signals**       | Channel contract, typed enum decoding, in-memory channel.          | [`Signal`], [`StateTable`], [`SimSignal`]   |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom subscribers). | [`Subscribe`], [`Event`]                    |
//! | **Station**       | Device registry, event fan-out and OS-signal shutdown.             | [`Station`], [`Config`]                     |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], which writes every event through `tracing`.
//!
//! ## Example
//! ```rust
//! use flyvisor::{Bus, Config, Flyer, Outcome, PumpSignals, SimSignal, SyringePump};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let state = SimSignal::with_labels("State_RBV", ["Idle", "Infusing", "Withdrawing", "Interrupted"], 0);
//! let delivered = SimSignal::new("Delivered_RBV", 0.0);
//! let pump = SyringePump::new(
//!     "syringe_pump",
//!     PumpSignals {
//!         state: state.shared(),
//!         delivered: delivered.shared(),
//!         run: SimSignal::new("Run", "Stop").shared(),
//!         infusion_volume: SimSignal::new("InfusionVolume_RBV", 10.0).shared(),
//!     },
//!     &Config::default(),
//!     Bus::default(),
//! )?;
//!
//! let kickoff = pump.kickoff()?;
//! state.put_index(1); // Infusing
//! assert!(kickoff.outcome().is_some_and(|o| o.is_success()));
//!
//! delivered.put(9.99);
//! let complete = pump.complete()?;
//! assert_eq!(complete.outcome(), Some(Outcome::success_with(9.99)));
//! # Ok(())
//! # }
//! ```
mod coordinator;
mod core;
mod devices;
mod error;
mod events;
mod guard;
mod policies;
mod signal;
mod status;
mod subscribers;

// ---- Public re-exports ----

pub use coordinator::{ActionCoordinator, DEFAULT_TOLERANCE, WatchId, converged, is_close};
pub use core::{Config, Registry, Station, StationBuilder};
pub use devices::{
    DelayGenerator, DelaySignals, Device, Flyer, Phase, PumpSignals, PumpState, SamplePump,
    SampleSignals, SampleState, SyringePump,
};
pub use error::{ActionError, DeviceError, OrderingViolation, SignalError, StationError, StatusError};
pub use events::{Bus, Event, EventKind};
pub use guard::{GuardSignals, RetryGuard};
pub use policies::BackoffPolicy;
pub use signal::{
    Callback, Detach, Notification, SimSignal, Signal, StateLabel, StateTable, Subscription,
    SubscriptionId, Value,
};
pub use status::{ActionStatus, Failure, Outcome, StatusState};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the tracing-backed event writer.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
