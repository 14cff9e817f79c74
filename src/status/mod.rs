//! Action statuses and their outcomes.
//!
//! - [`ActionStatus`] single-resolution, awaitable, callback-capable status
//! - [`Outcome`], [`Failure`], [`StatusState`] terminal results

mod action;
mod outcome;

pub use action::ActionStatus;
pub use outcome::{Failure, Outcome, StatusState};
