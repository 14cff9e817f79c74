//! Signal channels: the external collaborator the core is built on.
//!
//! ## Contents
//! - [`Value`], [`Notification`]          raw values and change notifications
//! - [`Signal`], [`Subscription`]         channel contract and cancellable handles
//! - [`StateTable`], [`StateLabel`]       typed decoding of enum channels
//! - [`SimSignal`]                        in-memory channel for tests and bench setups
//!
//! Real transports implement [`Signal`] outside this crate.

mod channel;
mod sim;
mod states;
mod value;

pub(crate) use channel::read_f64;
pub use channel::{Callback, Detach, Signal, Subscription, SubscriptionId};
pub use sim::SimSignal;
pub use states::{StateLabel, StateTable};
pub use value::{Notification, Value};
