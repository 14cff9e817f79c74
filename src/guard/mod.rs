//! Fault-tolerant write-and-verify.
//!
//! - [`RetryGuard`] conditioned set with reset-then-retry on hardware faults
//! - [`GuardSignals`] the four channels it drives

mod retry;

pub use retry::{GuardSignals, RetryGuard};
