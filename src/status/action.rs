//! # ActionStatus: single-resolution future.
//!
//! ```text
//!            resolve(o)  (first call wins)
//!  Pending ─────────────────────────────► Succeeded | Failed | Cancelled
//!     │                                        │
//!     │ resolve(o') after terminal ─► dropped  ├─► callbacks (each once)
//!     │                                        └─► wait()/await wake up
//! ```
//!
//! ## Rules
//! - The outcome is written **once**, under one lock; later `resolve` calls
//!   return `false` and change nothing.
//! - Callbacks run outside the lock, after the outcome is visible, so a
//!   callback may freely inspect or resolve other statuses.
//! - A callback added after resolution runs immediately, on the caller's thread.
//! - Clones share the same status.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::StatusError;
use crate::status::outcome::{Outcome, StatusState};

type StatusCallback = Box<dyn FnOnce(&Outcome) + Send>;

struct Slot {
    outcome: Option<Outcome>,
    callbacks: Vec<StatusCallback>,
}

struct Inner {
    name: Arc<str>,
    slot: Mutex<Slot>,
    tx: watch::Sender<Option<Outcome>>,
}

/// Outcome of one asynchronous action; resolves exactly once.
#[derive(Clone)]
pub struct ActionStatus {
    inner: Arc<Inner>,
}

impl ActionStatus {
    /// Creates a pending status.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                slot: Mutex::new(Slot {
                    outcome: None,
                    callbacks: Vec::new(),
                }),
                tx,
            }),
        }
    }

    /// Creates a status that is already terminal.
    pub fn done(name: impl Into<Arc<str>>, outcome: Outcome) -> Self {
        let status = Self::new(name);
        status.resolve(outcome);
        status
    }

    /// Name given at construction (device + action).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Resolves the status if it is still pending.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn resolve(&self, outcome: Outcome) -> bool {
        let callbacks = {
            let mut slot = self.inner.slot.lock();
            if slot.outcome.is_some() {
                return false;
            }
            slot.outcome = Some(outcome.clone());
            std::mem::take(&mut slot.callbacks)
        };

        tracing::debug!(status = %self.inner.name, state = ?outcome.state(), "status resolved");
        self.inner.tx.send_replace(Some(outcome.clone()));
        for cb in callbacks {
            cb(&outcome);
        }
        true
    }

    /// True once resolved.
    pub fn is_terminal(&self) -> bool {
        self.inner.slot.lock().outcome.is_some()
    }

    /// Current state.
    pub fn state(&self) -> StatusState {
        self.inner
            .slot
            .lock()
            .outcome
            .as_ref()
            .map_or(StatusState::Pending, Outcome::state)
    }

    /// Terminal outcome, if resolved.
    pub fn outcome(&self) -> Option<Outcome> {
        self.inner.slot.lock().outcome.clone()
    }

    /// Registers `f` to run once on resolution (immediately if already terminal).
    pub fn add_callback<F>(&self, f: F)
    where
        F: FnOnce(&Outcome) + Send + 'static,
    {
        let ready = {
            let mut slot = self.inner.slot.lock();
            match &slot.outcome {
                Some(outcome) => outcome.clone(),
                None => {
                    slot.callbacks.push(Box::new(f));
                    return;
                }
            }
        };
        f(&ready);
    }

    /// Waits for the outcome.
    ///
    /// With `timeout`, gives up after that long with [`StatusError::WaitTimeout`];
    /// the status itself stays pending and may still resolve later.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<Outcome, StatusError> {
        match timeout {
            Some(dur) => tokio::time::timeout(dur, self.settled())
                .await
                .map_err(|_elapsed| StatusError::WaitTimeout { timeout: dur }),
            None => Ok(self.settled().await),
        }
    }

    /// True if both handles point to the same status.
    pub fn ptr_eq(&self, other: &ActionStatus) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    async fn settled(&self) -> Outcome {
        let mut rx = self.inner.tx.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(outcome) = current {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return self.outcome().unwrap_or(Outcome::Cancelled);
            }
        }
    }
}

impl IntoFuture for ActionStatus {
    type Output = Outcome;
    type IntoFuture = BoxFuture<'static, Outcome>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.settled().await })
    }
}

impl std::fmt::Debug for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionStatus")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}
