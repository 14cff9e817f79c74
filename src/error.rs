//! Error types used by flyvisor.
//!
//! Only *caller misuse* and *infrastructure* problems are errors here. Expected
//! hardware outcomes (success, interruption, timeout, forced stop) travel as
//! [`Outcome`](crate::Outcome) values on an [`ActionStatus`](crate::ActionStatus).
//!
//! - [`SignalError`]: channel I/O and enum-table validation.
//! - [`ActionError`]: coordinator infrastructure (timers, continuations).
//! - [`DeviceError`]: anything a device call can reject synchronously.
//! - [`StatusError`]: waiting on a status failed.
//! - [`StationError`]: registry/station wiring.
//!
//! Each enum provides `as_label` (stable snake_case for logs/metrics).

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by signal channels.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// The hardware rejected or dropped a write.
    #[error("write to '{channel}' failed: {reason}")]
    WriteFailed {
        /// Channel name.
        channel: String,
        /// Transport-level reason.
        reason: String,
    },

    /// Hardware reported a state label the device does not know.
    #[error("channel '{channel}' reports unrecognized state label '{label}'")]
    UnknownLabel {
        /// Channel name.
        channel: String,
        /// The offending label.
        label: String,
    },

    /// A state the device relies on is absent from the hardware label table.
    #[error("channel '{channel}' has no label for required state '{state}'")]
    MissingVariant {
        /// Channel name.
        channel: String,
        /// The missing state.
        state: &'static str,
    },

    /// A notification carried an index outside the label table.
    #[error("channel '{channel}' delivered index {value} outside its label table")]
    BadIndex {
        /// Channel name.
        channel: String,
        /// Raw value as received.
        value: String,
    },

    /// The channel was expected to be an enum but exposes no labels.
    #[error("channel '{channel}' is not an enum channel")]
    NotEnum {
        /// Channel name.
        channel: String,
    },

    /// The channel value has the wrong shape for the requested view.
    #[error("channel '{channel}' value '{value}' is not {expected}")]
    TypeMismatch {
        /// Channel name.
        channel: String,
        /// Raw value as read.
        value: String,
        /// Expected shape.
        expected: &'static str,
    },

    /// The channel is gone (dropped or disconnected).
    #[error("channel '{channel}' is closed")]
    Closed {
        /// Channel name.
        channel: String,
    },
}

impl SignalError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalError::WriteFailed { .. } => "signal_write_failed",
            SignalError::UnknownLabel { .. } => "signal_unknown_label",
            SignalError::MissingVariant { .. } => "signal_missing_variant",
            SignalError::BadIndex { .. } => "signal_bad_index",
            SignalError::NotEnum { .. } => "signal_not_enum",
            SignalError::TypeMismatch { .. } => "signal_type_mismatch",
            SignalError::Closed { .. } => "signal_closed",
        }
    }
}

/// # Errors produced by the action coordinator infrastructure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    /// A timer or scheduled continuation was requested outside a tokio runtime.
    #[error("no tokio runtime available to schedule '{what}'")]
    NoRuntime {
        /// What was being scheduled.
        what: &'static str,
    },
}

impl ActionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::NoRuntime { .. } => "action_no_runtime",
        }
    }
}

/// # Caller misuse of the kickoff/complete contract.
///
/// Fatal to the call, never to the device.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingViolation {
    /// `kickoff` called while a previous kickoff is still in flight.
    #[error("kickoff requested while a previous kickoff is still in flight")]
    KickoffInFlight,

    /// `complete` called without a pending completion.
    #[error("complete requested before kickoff (or complete called twice)")]
    CompleteWithoutKickoff,
}

/// # Errors a device call rejects synchronously.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// Ordering misuse on device `device`.
    #[error("device '{device}': {violation}")]
    Ordering {
        /// Device name.
        device: String,
        /// What was violated.
        violation: OrderingViolation,
    },

    /// Channel I/O or validation failed.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Coordinator infrastructure failed.
    #[error(transparent)]
    Action(#[from] ActionError),
}

impl DeviceError {
    pub(crate) fn ordering(device: &str, violation: OrderingViolation) -> Self {
        DeviceError::Ordering {
            device: device.to_string(),
            violation,
        }
    }

    /// True when the call was rejected because of kickoff/complete misuse.
    pub fn is_ordering_violation(&self) -> bool {
        matches!(self, DeviceError::Ordering { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeviceError::Ordering {
                violation: OrderingViolation::KickoffInFlight,
                ..
            } => "device_kickoff_in_flight",
            DeviceError::Ordering {
                violation: OrderingViolation::CompleteWithoutKickoff,
                ..
            } => "device_complete_without_kickoff",
            DeviceError::Signal(e) => e.as_label(),
            DeviceError::Action(e) => e.as_label(),
        }
    }
}

/// # Errors returned while waiting on an [`ActionStatus`](crate::ActionStatus).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    /// The wait gave up; the status itself is still pending.
    #[error("status still pending after {timeout:?}")]
    WaitTimeout {
        /// How long the caller waited.
        timeout: Duration,
    },
}

impl StatusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StatusError::WaitTimeout { .. } => "status_wait_timeout",
        }
    }
}

/// # Errors produced by the station and its registry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StationError {
    /// A device with the same name is already registered.
    #[error("device '{name}' is already registered")]
    DuplicateDevice {
        /// Device name.
        name: String,
    },

    /// No device with this name is registered.
    #[error("device '{name}' is not registered")]
    UnknownDevice {
        /// Device name.
        name: String,
    },

    /// Registering the OS termination signal handlers failed.
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),

    /// Stopping one or more devices during shutdown failed.
    #[error("failed to stop devices: {failed:?}")]
    StopFailed {
        /// Device names paired with their failures.
        failed: Vec<(String, DeviceError)>,
    },
}

impl StationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StationError::DuplicateDevice { .. } => "station_duplicate_device",
            StationError::UnknownDevice { .. } => "station_unknown_device",
            StationError::Signal(_) => "station_signal",
            StationError::StopFailed { .. } => "station_stop_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_violation_is_flagged() {
        let err = DeviceError::ordering("pump", OrderingViolation::KickoffInFlight);
        assert!(err.is_ordering_violation());
        assert_eq!(err.as_label(), "device_kickoff_in_flight");
        assert!(err.to_string().contains("pump"));
    }

    #[test]
    fn test_signal_error_is_not_ordering() {
        let err: DeviceError = SignalError::Closed {
            channel: "state".into(),
        }
        .into();
        assert!(!err.is_ordering_violation());
        assert_eq!(err.as_label(), "signal_closed");
    }
}
