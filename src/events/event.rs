//! # Events emitted by coordinators, retry guards and devices.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: kickoff/complete/stop flow of a device
//! - **Status events**: resolution and timeouts of individual action statuses
//! - **Recovery events**: faults observed and writes re-issued by a retry guard
//! - **Runtime events**: subscriber health and station shutdown
//!
//! The [`Event`] struct carries additional metadata such as timestamps, device
//! name, status name, reasons and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use flyvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_device("dg")
//!     .with_reason("delay_status=1")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.device.as_deref(), Some("dg"));
//! assert_eq!(ev.delay_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::status::StatusState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Device lifecycle ===
    /// `kickoff` accepted; watchers armed, run command about to be issued.
    ///
    /// Sets: `device`, `value` (captured target, when the device has one).
    KickoffRequested,

    /// Hardware confirmed the action started.
    ///
    /// Sets: `device`.
    KickoffConfirmed,

    /// Hardware entered an abnormal state while an action was in flight.
    ///
    /// Sets: `device`, `reason` (state label).
    Interrupted,

    /// `complete` handed out the pre-armed completion status.
    ///
    /// Sets: `device`.
    CompleteRequested,

    /// `stop` was issued.
    ///
    /// Sets: `device`, `reason` (`success` / `failure`).
    StopIssued,

    // === Action statuses ===
    /// A coordinator-owned status reached a terminal state.
    ///
    /// Sets: `device`, `action`, `state`, `reason` (failure detail, if any).
    StatusResolved,

    /// A coordinator timer fired before any watcher resolved the status.
    ///
    /// Sets: `device`, `action`, `timeout_ms`.
    TimeoutHit,

    // === Retry guard ===
    /// A fault channel reported an error.
    ///
    /// Sets: `device`, `reason` (fault channel and value).
    FaultObserved,

    /// A reset-then-retry (or plain re-issue) was scheduled.
    ///
    /// Sets: `device`, `attempt` (fault episode, 1-based), `delay_ms`, `reason`.
    RetryScheduled,

    /// A write was re-issued by the retry guard.
    ///
    /// Sets: `device`, `value` (written value), `attempt`.
    WriteReissued,

    /// A write issued by the retry guard failed at transport level.
    ///
    /// Sets: `device`, `reason`.
    WriteFailed,

    // === Runtime ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `device` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `device` (subscriber name), `reason`.
    SubscriberOverflow,

    /// OS termination signal observed; every device is being stopped.
    ShutdownRequested,
}

/// Event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Device name, if applicable.
    pub device: Option<Arc<str>>,
    /// Status name (e.g. `pump.kickoff`), if applicable.
    pub action: Option<Arc<str>>,
    /// Terminal state of a status.
    pub state: Option<StatusState>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Numeric value (target, written value).
    pub value: Option<f64>,
    /// Fault episode / attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds.
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            device: None,
            action: None,
            state: None,
            reason: None,
            value: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
        }
    }

    /// Attaches a device name.
    #[inline]
    pub fn with_device(mut self, device: impl Into<Arc<str>>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Attaches a status name.
    #[inline]
    pub fn with_action(mut self, action: impl Into<Arc<str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attaches a terminal state.
    #[inline]
    pub fn with_state(mut self, state: StatusState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a numeric value.
    #[inline]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Attaches an attempt / episode count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_device(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_device(subscriber)
            .with_reason(info)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
