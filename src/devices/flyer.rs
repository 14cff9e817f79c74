//! # Device traits.
//!
//! Every actuator is a [`Device`]: it has a name and can always be stopped.
//! Devices with a kickoff/complete lifecycle are also [`Flyer`]s.
//!
//! ```text
//!            kickoff()                 hardware confirms
//!   Idle ───────────────► KickoffPending ──────────────► Active
//!    ▲                         │                           │
//!    │      Interrupted        │                           │ complete()
//!    ├─────────────────────────┘                           ▼
//!    │                                               CompletePending
//!    └──────────────── completion resolves ◄───────────────┘
//! ```
//!
//! `stop(success)` returns any phase to `Idle`.

use crate::error::DeviceError;
use crate::status::ActionStatus;

/// Observable lifecycle phase of a [`Flyer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing in flight; `kickoff` accepted.
    Idle,
    /// Kickoff issued; waiting for the hardware to confirm (or a failed
    /// kickoff waiting for `stop`).
    KickoffPending,
    /// Hardware confirmed; completion pre-armed.
    Active,
    /// `complete` handed out a completion that is still pending.
    CompletePending,
}

impl Phase {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::KickoffPending => "kickoff_pending",
            Phase::Active => "active",
            Phase::CompletePending => "complete_pending",
        }
    }
}

/// A named actuator that can always be stopped.
pub trait Device: Send + Sync + 'static {
    /// Unique device name.
    fn name(&self) -> &str;

    /// Force-resolves whatever is in flight and halts the hardware.
    ///
    /// Pending statuses resolve `Succeeded` when `success` is true, otherwise
    /// `Failed(Stopped)`. Terminal statuses are never overwritten.
    fn stop(&self, success: bool) -> Result<(), DeviceError>;

    /// Kickoff/complete view of this device, if it has one.
    fn as_flyer(&self) -> Option<&dyn Flyer> {
        None
    }
}

/// A device driven through kickoff → complete.
pub trait Flyer: Device {
    /// Starts the action; the returned status resolves when the hardware
    /// confirms it started.
    ///
    /// Rejected while a previous kickoff is in flight.
    fn kickoff(&self) -> Result<ActionStatus, DeviceError>;

    /// Returns the status that resolves when the action finishes.
    ///
    /// Rejected when there is no pending completion.
    fn complete(&self) -> Result<ActionStatus, DeviceError>;

    /// Current lifecycle phase.
    fn phase(&self) -> Phase;
}
