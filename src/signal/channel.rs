//! # Signal channel contract and subscription handles.
//!
//! A [`Signal`] is the external collaborator: a named value source that can be
//! read, written and subscribed to. Implementations deliver notifications
//! **synchronously**, in channel-local order, on the thread that produced them.
//!
//! ## Subscription lifecycle
//! ```text
//! subscribe(cb) ──► Subscription { id, active = true }
//!                        │
//!            cancel() ───┤ active: true → false, channel.detach(id)
//!            cancel() ───┘ active already false → no-op
//! ```
//!
//! The `active` flag is shared with the channel. Dispatch checks it before
//! every invocation, so a subscription cancelled while a notification is being
//! delivered (including from inside its own callback) receives nothing further.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::error::SignalError;
use crate::signal::value::{Notification, Value};

/// Callback invoked for every notification on a channel.
pub type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Identifier of one subscription, unique per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Channel-side removal hook used by [`Subscription::cancel`].
pub trait Detach: Send + Sync {
    /// Removes the subscription `id` from the channel.
    fn detach(&self, id: SubscriptionId);
}

/// # Hardware value source.
///
/// The core only ever talks to hardware through this trait.
pub trait Signal: Send + Sync + 'static {
    /// Channel name (used in logs and errors).
    fn name(&self) -> &str;

    /// Reads the current value.
    fn read(&self) -> Result<Value, SignalError>;

    /// Writes a new value.
    fn write(&self, value: Value) -> Result<(), SignalError>;

    /// Registers `callback`; if `run_immediately`, it is first called once with
    /// the current value (`old == new`).
    fn subscribe(&self, callback: Callback, run_immediately: bool) -> Subscription;

    /// Label table for channels whose raw value indexes named states.
    ///
    /// `None` for plain (non-enum) channels.
    fn enum_labels(&self) -> Option<Vec<String>>;
}

/// Reads `signal` as a number.
pub(crate) fn read_f64(signal: &dyn Signal) -> Result<f64, SignalError> {
    let value = signal.read()?;
    value.as_f64().ok_or_else(|| SignalError::TypeMismatch {
        channel: signal.name().to_string(),
        value: value.to_string(),
        expected: "numeric",
    })
}

/// Cancellable registration of a callback on a [`Signal`].
///
/// Dropping a subscription does **not** cancel it; ownership is expected to
/// sit with an [`ActionCoordinator`](crate::ActionCoordinator) that cancels on
/// teardown.
pub struct Subscription {
    id: SubscriptionId,
    channel: Arc<str>,
    active: Arc<AtomicBool>,
    owner: Weak<dyn Detach>,
}

impl Subscription {
    /// Creates a handle.
    ///
    /// `active` must be the same flag the channel checks before dispatching.
    pub fn new(
        id: SubscriptionId,
        channel: impl Into<Arc<str>>,
        active: Arc<AtomicBool>,
        owner: Weak<dyn Detach>,
    ) -> Self {
        Self {
            id,
            channel: channel.into(),
            active,
            owner,
        }
    }

    /// Subscription id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Name of the channel this subscription lives on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Cancels the subscription.
    ///
    /// Returns `true` for the call that actually cancelled; repeated calls are
    /// no-ops returning `false`.
    pub fn cancel(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.detach(self.id);
        }
        true
    }

    /// True once [`cancel`](Self::cancel) has run.
    pub fn is_cancelled(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
