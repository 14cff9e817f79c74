//! # Event bus for broadcasting action events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from many sources (coordinators, retry
//! guards, devices, the station).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                     Subscriber (one):
//!   Coordinator ──┐
//!   RetryGuard  ──┼──────► Bus ───────► station listener ────► SubscriberSet
//!   Device      ──┤  (broadcast chan)
//!   Station     ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: safe to call from inside a signal callback.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    /// A bus with capacity 1024.
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_receiver_sees_events_after_subscribe() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::StopIssued));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::KickoffRequested).with_device("pump"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::KickoffRequested);
        assert_eq!(ev.device.as_deref(), Some("pump"));
    }
}
