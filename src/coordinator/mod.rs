//! Action coordination: first-arrival-wins resolution with guaranteed teardown.
//!
//! - [`ActionCoordinator`] owns a status and the watchers feeding it
//! - [`converged`], [`is_close`] numeric completion tests

mod action;
mod convergence;

pub use action::{ActionCoordinator, WatchId};
pub use convergence::{DEFAULT_TOLERANCE, converged, is_close};
