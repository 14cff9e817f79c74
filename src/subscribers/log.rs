//! # LogWriter: events as `tracing` records.
//!
//! A subscriber that turns every [`Event`] into one structured `tracing`
//! record under the `flyvisor::events` target. Failures and faults log at
//! `warn`, everything else at `info`/`debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  flyvisor::events: kickoff requested device=syringe_pump value=10.0
//! INFO  flyvisor::events: status resolved device=syringe_pump action=syringe_pump.kickoff state=Succeeded
//! WARN  flyvisor::events: fault observed device=dg reason=delay_status=1
//! INFO  flyvisor::events: retry scheduled device=dg attempt=1 delay_ms=5000
//! WARN  flyvisor::events: timeout device=sample_pump action=sample_pump.kickoff timeout_ms=1500
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::status::StatusState;
use crate::subscribers::Subscribe;

const TARGET: &str = "flyvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let device = e.device.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::KickoffRequested => {
                tracing::info!(target: TARGET, device, value = ?e.value, "kickoff requested");
            }
            EventKind::KickoffConfirmed => {
                tracing::info!(target: TARGET, device, "kickoff confirmed");
            }
            EventKind::Interrupted => {
                tracing::warn!(target: TARGET, device, reason, "interrupted");
            }
            EventKind::CompleteRequested => {
                tracing::info!(target: TARGET, device, "complete requested");
            }
            EventKind::StopIssued => {
                tracing::info!(target: TARGET, device, reason, "stop issued");
            }
            EventKind::StatusResolved => {
                let action = e.action.as_deref().unwrap_or("-");
                match e.state {
                    Some(StatusState::Failed) => {
                        tracing::warn!(target: TARGET, device, action, reason, "status failed");
                    }
                    state => {
                        tracing::info!(target: TARGET, device, action, state = ?state, "status resolved");
                    }
                }
            }
            EventKind::TimeoutHit => {
                let action = e.action.as_deref().unwrap_or("-");
                tracing::warn!(target: TARGET, device, action, timeout_ms = ?e.timeout_ms, "timeout");
            }
            EventKind::FaultObserved => {
                tracing::warn!(target: TARGET, device, reason, "fault observed");
            }
            EventKind::RetryScheduled => {
                tracing::info!(
                    target: TARGET,
                    device,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    reason,
                    "retry scheduled"
                );
            }
            EventKind::WriteReissued => {
                tracing::debug!(target: TARGET, device, value = ?e.value, attempt = ?e.attempt, "write re-issued");
            }
            EventKind::WriteFailed => {
                tracing::warn!(target: TARGET, device, reason, "write failed");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: TARGET, subscriber = device, info = reason, "subscriber panicked");
            }
            EventKind::SubscriberOverflow => {
                tracing::debug!(target: TARGET, subscriber = device, reason, "subscriber overflow");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: TARGET, "shutdown requested");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::events::Bus;
    use crate::subscribers::SubscriberSet;

    #[tokio::test]
    async fn test_every_event_kind_is_written() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(LogWriter::new()) as Arc<dyn Subscribe>], bus.clone());

        let events = [
            Event::new(EventKind::KickoffRequested).with_device("p").with_value(10.0),
            Event::new(EventKind::KickoffConfirmed).with_device("p"),
            Event::new(EventKind::Interrupted).with_reason("Interrupted"),
            Event::new(EventKind::CompleteRequested),
            Event::new(EventKind::StopIssued).with_reason("failure"),
            Event::new(EventKind::StatusResolved).with_state(StatusState::Failed),
            Event::new(EventKind::StatusResolved).with_state(StatusState::Succeeded),
            Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_millis(1500)),
            Event::new(EventKind::FaultObserved).with_reason("delay_status=1"),
            Event::new(EventKind::RetryScheduled).with_attempt(1).with_delay(Duration::from_secs(5)),
            Event::new(EventKind::WriteReissued).with_value(2.0),
            Event::new(EventKind::WriteFailed).with_reason("link down"),
            Event::subscriber_panicked("other", "boom".to_string()),
            Event::subscriber_overflow("other", "full"),
            Event::new(EventKind::ShutdownRequested),
        ];
        for ev in &events {
            set.emit(ev);
        }
        set.shutdown().await;

        assert!(rx.try_recv().is_err());
    }
}
