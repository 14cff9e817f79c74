//! # In-memory signal channel.
//!
//! [`SimSignal`] implements [`Signal`] without any transport. It is what the
//! test-suite drives, and it doubles as a bench stand-in for real hardware.
//!
//! ## Dispatch
//! ```text
//! put/write(v)
//!   ├─► value := v, queue.push(Notification{old, new})
//!   ├─► already dispatching? → return (outer loop delivers it)
//!   └─► loop { pop → snapshot subscribers → unlock → deliver to each active one }
//! ```
//!
//! ## Rules
//! - Notifications are delivered in the order they were produced, also when a
//!   callback writes to the same channel (the nested write is queued).
//! - A subscription cancelled mid-dispatch is skipped for the rest of it.
//! - No lock is held while a callback runs, so callbacks may subscribe,
//!   cancel, read or write freely.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::SignalError;
use crate::signal::channel::{Callback, Detach, Signal, Subscription, SubscriptionId};
use crate::signal::value::{Notification, Value};

struct Entry {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    callback: Callback,
}

struct SimState {
    value: Value,
    entries: Vec<Entry>,
    next_id: u64,
    queue: VecDeque<Notification>,
    dispatching: bool,
    writes: Vec<Value>,
    fail_writes: Option<String>,
}

struct SimInner {
    name: String,
    labels: Option<Vec<String>>,
    state: Mutex<SimState>,
}

impl Detach for SimInner {
    fn detach(&self, id: SubscriptionId) {
        self.state.lock().entries.retain(|e| e.id != id);
    }
}

/// Unblocks the channel if a callback panics mid-dispatch.
struct DispatchGuard<'a>(&'a SimInner);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut st = self.0.state.lock();
            st.dispatching = false;
            st.queue.clear();
        }
    }
}

/// In-memory [`Signal`] with synchronous, ordered delivery.
///
/// Cheap to clone; clones share the same channel.
#[derive(Clone)]
pub struct SimSignal {
    inner: Arc<SimInner>,
}

impl SimSignal {
    /// Plain channel holding `initial`.
    pub fn new(name: impl Into<String>, initial: impl Into<Value>) -> Self {
        Self::build(name.into(), None, initial.into())
    }

    /// Enum channel with `labels`, starting at label index `initial`.
    pub fn with_labels<I, S>(name: impl Into<String>, labels: I, initial: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels.into_iter().map(Into::into).collect();
        let initial = i64::try_from(initial).unwrap_or(i64::MAX);
        Self::build(name.into(), Some(labels), Value::Int(initial))
    }

    fn build(name: String, labels: Option<Vec<String>>, value: Value) -> Self {
        Self {
            inner: Arc::new(SimInner {
                name,
                labels,
                state: Mutex::new(SimState {
                    value,
                    entries: Vec::new(),
                    next_id: 0,
                    queue: VecDeque::new(),
                    dispatching: false,
                    writes: Vec::new(),
                    fail_writes: None,
                }),
            }),
        }
    }

    /// Returns the channel as a shared trait object.
    pub fn shared(&self) -> Arc<dyn Signal> {
        Arc::new(self.clone())
    }

    /// Simulates a hardware-side change and notifies subscribers.
    ///
    /// Not recorded in [`writes`](Self::writes).
    pub fn put(&self, value: impl Into<Value>) {
        self.push(value.into());
    }

    /// Simulates a change to the enum label at `index`.
    pub fn put_index(&self, index: usize) {
        self.put(i64::try_from(index).unwrap_or(i64::MAX));
    }

    /// Every value written through [`Signal::write`], including failed attempts.
    pub fn writes(&self) -> Vec<Value> {
        self.inner.state.lock().writes.clone()
    }

    /// Forgets the recorded write history.
    pub fn clear_writes(&self) {
        self.inner.state.lock().writes.clear();
    }

    /// Makes every subsequent write fail with `reason` until [`heal`](Self::heal).
    pub fn fail_writes(&self, reason: impl Into<String>) {
        self.inner.state.lock().fail_writes = Some(reason.into());
    }

    /// Clears an injected write failure.
    pub fn heal(&self) {
        self.inner.state.lock().fail_writes = None;
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    fn push(&self, new: Value) {
        {
            let mut st = self.inner.state.lock();
            let old = std::mem::replace(&mut st.value, new.clone());
            st.queue.push_back(Notification::now(old, new));
            if st.dispatching {
                return;
            }
            st.dispatching = true;
        }
        let _guard = DispatchGuard(&self.inner);
        loop {
            let (note, targets) = {
                let mut st = self.inner.state.lock();
                let Some(note) = st.queue.pop_front() else {
                    st.dispatching = false;
                    break;
                };
                let targets: Vec<(Arc<AtomicBool>, Callback)> = st
                    .entries
                    .iter()
                    .map(|e| (Arc::clone(&e.active), Arc::clone(&e.callback)))
                    .collect();
                (note, targets)
            };
            for (active, callback) in targets {
                if active.load(Ordering::Acquire) {
                    callback(&note);
                }
            }
        }
    }
}

impl Signal for SimSignal {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn read(&self) -> Result<Value, SignalError> {
        Ok(self.inner.state.lock().value.clone())
    }

    fn write(&self, value: Value) -> Result<(), SignalError> {
        {
            let mut st = self.inner.state.lock();
            st.writes.push(value.clone());
            if let Some(reason) = &st.fail_writes {
                return Err(SignalError::WriteFailed {
                    channel: self.inner.name.clone(),
                    reason: reason.clone(),
                });
            }
        }
        self.push(value);
        Ok(())
    }

    fn subscribe(&self, callback: Callback, run_immediately: bool) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let (id, current) = {
            let mut st = self.inner.state.lock();
            let id = SubscriptionId(st.next_id);
            st.next_id += 1;
            st.entries.push(Entry {
                id,
                active: Arc::clone(&active),
                callback: Arc::clone(&callback),
            });
            (id, st.value.clone())
        };

        let weak: Weak<SimInner> = Arc::downgrade(&self.inner);
        let owner: Weak<dyn Detach> = weak;
        let sub = Subscription::new(id, self.inner.name.as_str(), Arc::clone(&active), owner);

        if run_immediately && active.load(Ordering::Acquire) {
            callback(&Notification::now(current.clone(), current));
        }
        sub
    }

    fn enum_labels(&self) -> Option<Vec<String>> {
        self.inner.labels.clone()
    }
}
