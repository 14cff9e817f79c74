//! Timing policies.
//!
//! - [`BackoffPolicy`] how long a retry guard waits before re-issuing a faulted write
//!
//! ## Quick wiring
//! ```text
//! Config { retry_backoff: BackoffPolicy, .. }
//!      └─► guard::RetryGuard uses backoff.next(episode) for every scheduled re-issue
//! ```

mod backoff;

pub use backoff::BackoffPolicy;
