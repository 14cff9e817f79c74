//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out that feeds events broadcast through the [`Bus`](crate::events::Bus)
//! to every subscriber.
//!
//! ## Architecture
//! ```text
//! Coordinator / RetryGuard / Device ── publish(Event) ──► Bus
//!                                                          │
//!                                              SubscriberSet listener
//!                                                          │
//!                                        ┌─────────────────┼──────────────┐
//!                                        ▼                 ▼              ▼
//!                                    LogWriter          Metrics         Custom
//! ```
//!
//! [`LogWriter`] is available with the `logging` feature.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
