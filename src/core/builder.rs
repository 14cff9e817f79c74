use std::sync::Arc;

use crate::{
    core::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::station::Station;

/// Builder for constructing a [`Station`].
pub struct StationBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl StationBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive device events (kickoffs, resolutions, faults)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the station. Must be called inside a tokio runtime.
    ///
    /// Initializes:
    /// - event bus sized by `cfg.bus_capacity`
    /// - subscriber workers and the bus listener feeding them
    /// - an empty device registry
    pub fn build(self) -> Station {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        Station::new_internal(self.cfg, bus, subs)
    }
}
