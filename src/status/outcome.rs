//! # Terminal outcomes of an action.
//!
//! Every expected hardware result is an [`Outcome`], never an error:
//! sequencing code branches on it instead of catching anything.

use std::time::Duration;

use thiserror::Error;

use crate::signal::Value;

/// Observable state of an [`ActionStatus`](crate::ActionStatus).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusState {
    /// Not resolved yet.
    Pending,
    /// Resolved successfully.
    Succeeded,
    /// Resolved with a [`Failure`].
    Failed,
    /// Resolved by cancellation (nobody will ever observe the real result).
    Cancelled,
}

impl StatusState {
    /// True for every state except [`StatusState::Pending`].
    pub fn is_terminal(self) -> bool {
        !matches!(self, StatusState::Pending)
    }
}

/// Why an action failed.
#[non_exhaustive]
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Failure {
    /// Hardware entered an abnormal state.
    #[error("hardware reported '{state}'")]
    Interrupted {
        /// Label of the state that was entered.
        state: &'static str,
    },

    /// No confirmation arrived in time; hardware is presumed non-responsive.
    #[error("no confirmation within {after:?}")]
    Timeout {
        /// Configured confirmation window.
        after: Duration,
    },

    /// The caller forced the action to end.
    #[error("stopped by caller")]
    Stopped,

    /// Any other hardware-side failure.
    #[error("hardware failure: {0}")]
    Hardware(String),
}

impl Failure {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Failure::Interrupted { .. } => "failure_interrupted",
            Failure::Timeout { .. } => "failure_timeout",
            Failure::Stopped => "failure_stopped",
            Failure::Hardware(_) => "failure_hardware",
        }
    }
}

/// Terminal result of one asynchronous action.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Completed; optional payload (e.g. the final readback).
    Succeeded(Option<Value>),
    /// Completed abnormally.
    Failed(Failure),
    /// Abandoned.
    Cancelled,
}

impl Outcome {
    /// Success without payload.
    pub fn success() -> Self {
        Outcome::Succeeded(None)
    }

    /// Success carrying `payload`.
    pub fn success_with(payload: impl Into<Value>) -> Self {
        Outcome::Succeeded(Some(payload.into()))
    }

    /// Failure with `reason`.
    pub fn failed(reason: Failure) -> Self {
        Outcome::Failed(reason)
    }

    /// Outcome matching a forced stop: `Succeeded` or `Failed(Stopped)`.
    pub fn forced(success: bool) -> Self {
        if success {
            Outcome::success()
        } else {
            Outcome::Failed(Failure::Stopped)
        }
    }

    /// The state this outcome moves a status into.
    pub fn state(&self) -> StatusState {
        match self {
            Outcome::Succeeded(_) => StatusState::Succeeded,
            Outcome::Failed(_) => StatusState::Failed,
            Outcome::Cancelled => StatusState::Cancelled,
        }
    }

    /// True for [`Outcome::Succeeded`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    /// Success payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Outcome::Succeeded(p) => p.as_ref(),
            _ => None,
        }
    }

    /// Failure detail, if any.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed(f) => Some(f),
            _ => None,
        }
    }
}
