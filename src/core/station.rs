//! # Station: the devices of one endstation, their events and their shutdown.
//!
//! The [`Station`] owns the event bus, a [`SubscriberSet`] fed from it, the
//! device [`Registry`] and the shared [`Config`].
//!
//! ## Architecture
//! ```text
//! Station::builder(cfg).with_subscribers(subs).build()
//!   ├─► Bus::new(cfg.bus_capacity)
//!   ├─► SubscriberSet::new(subs) ── listener: Bus ─► emit(&Event)
//!   └─► Registry (empty)
//!
//! add(device) ─► Registry::register ─► Arc<D> back to the caller
//!
//! run_until_shutdown():
//!   shutdown::wait_for_termination()
//!             └─► Bus.publish(ShutdownRequested)
//!             └─► Registry::stop_all(success = false)
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use flyvisor::{Config, PumpSignals, SimSignal, Station, SyringePump};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let station = Station::builder(Config::default()).build();
//!
//!     let state = SimSignal::with_labels("State_RBV", ["Idle", "Infusing", "Withdrawing", "Interrupted"], 0);
//!     let signals = PumpSignals {
//!         state: state.shared(),
//!         delivered: SimSignal::new("Delivered_RBV", 0.0).shared(),
//!         run: SimSignal::new("Run", "Stop").shared(),
//!         infusion_volume: SimSignal::new("InfusionVolume_RBV", 10.0).shared(),
//!     };
//!     let pump = station.add(SyringePump::new("syringe_pump", signals, station.config(), station.bus())?)?;
//!
//!     use flyvisor::Flyer;
//!     let kickoff = pump.kickoff()?;
//!     state.put_index(1);
//!     assert!(kickoff.await.is_success());
//!
//!     station.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{Config, Registry, shutdown};
use crate::devices::Device;
use crate::error::StationError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;

use super::builder::StationBuilder;

/// Devices, event delivery and shutdown of one endstation.
pub struct Station {
    cfg: Config,
    bus: Bus,
    subs: Option<Arc<SubscriberSet>>,
    registry: Registry,
    token: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl Station {
    /// Starts building a station with `cfg`.
    pub fn builder(cfg: Config) -> StationBuilder {
        StationBuilder::new(cfg)
    }

    pub(super) fn new_internal(cfg: Config, bus: Bus, subs: Arc<SubscriberSet>) -> Self {
        let token = CancellationToken::new();
        let listener = Arc::clone(&subs).spawn_listener(token.clone());
        Self {
            cfg,
            bus,
            subs: Some(subs),
            registry: Registry::new(),
            token,
            listener: Some(listener),
        }
    }

    /// Shared configuration; pass it to device constructors.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus; pass a clone to device constructors.
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// Number of event subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs.as_ref().map_or(0, |subs| subs.len())
    }

    /// Device registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers `device` and returns a typed handle to it.
    pub fn add<D: Device>(&self, device: D) -> Result<Arc<D>, StationError> {
        let device = Arc::new(device);
        self.registry.register(device.clone())?;
        Ok(device)
    }

    /// Looks up a registered device.
    pub fn device(&self, name: &str) -> Result<Arc<dyn Device>, StationError> {
        self.registry
            .get(name)
            .ok_or_else(|| StationError::UnknownDevice {
                name: name.to_string(),
            })
    }

    /// Publishes `ShutdownRequested` and stops every device with `success = false`.
    pub fn shutdown(&self) -> Result<(), StationError> {
        tracing::info!(devices = self.registry.len(), "stopping all devices");
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.registry.stop_all(false)
    }

    /// Waits for an OS termination signal, then [`shutdown`](Self::shutdown)s.
    pub async fn run_until_shutdown(&self) -> Result<(), StationError> {
        shutdown::wait_for_termination().await?;
        self.shutdown()
    }

    /// Stops forwarding bus events and waits until every subscriber has
    /// processed what was already queued for it.
    pub async fn close(mut self) {
        self.token.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
        if let Some(subs) = self.subs.take().and_then(Arc::into_inner) {
            subs.shutdown().await;
        }
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Flyer, PumpSignals, SyringePump};
    use crate::signal::{SimSignal, Value};
    use crate::status::{Failure, Outcome};
    use crate::subscribers::Subscribe;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    #[tokio::test]
    async fn test_close_drains_subscribers() {
        let seen = Arc::new(Collect::default());
        let station = Station::builder(Config::default())
            .with_subscribers(vec![Arc::clone(&seen) as Arc<dyn Subscribe>])
            .build();
        assert_eq!(station.subscriber_count(), 1);
        tokio::task::yield_now().await;

        station.shutdown().unwrap();
        station.close().await;
        assert_eq!(*seen.0.lock(), vec![EventKind::ShutdownRequested]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_registered_devices() {
        let station = Station::builder(Config::default()).build();
        let mut rx = station.bus().subscribe();

        let run = SimSignal::new("Run", "Stop");
        let signals = PumpSignals {
            state: SimSignal::with_labels("State_RBV", ["Idle", "Infusing", "Withdrawing", "Interrupted"], 0)
                .shared(),
            delivered: SimSignal::new("Delivered_RBV", 0.0).shared(),
            run: run.shared(),
            infusion_volume: SimSignal::new("InfusionVolume_RBV", 10.0).shared(),
        };
        let pump = station
            .add(SyringePump::new("syringe_pump", signals.clone(), station.config(), station.bus()).unwrap())
            .unwrap();
        let dup = SyringePump::new("syringe_pump", signals, station.config(), station.bus()).unwrap();
        assert!(station.add(dup).is_err());

        let ko = pump.kickoff().unwrap();
        station.shutdown().unwrap();

        assert_eq!(ko.outcome(), Some(Outcome::failed(Failure::Stopped)));
        assert_eq!(run.writes().last(), Some(&Value::from("Stop")));
        assert!(station.device("syringe_pump").unwrap().as_flyer().is_some());
        assert!(station.device("missing").is_err());

        let mut saw_shutdown = false;
        while let Ok(ev) = rx.try_recv() {
            saw_shutdown |= ev.kind == EventKind::ShutdownRequested;
        }
        assert!(saw_shutdown);
    }
}
