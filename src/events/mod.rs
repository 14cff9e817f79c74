//! Events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ActionCoordinator` (resolution, timeouts), `RetryGuard`
//!   (faults, retries), devices (kickoff/complete/stop), `Station` (shutdown),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the station listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
