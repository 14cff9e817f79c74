//! # Device registry: explicit name → device map.
//!
//! Devices are registered once, by unique name, and looked up by the sequencing
//! code. The registry is what the station walks on shutdown.
//!
//! ## Rules
//! - Names are unique; a second registration under the same name is rejected.
//! - `stop_all` visits every device even if some fail, then reports all failures.
//! - The lock is never held while a device method runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::devices::Device;
use crate::error::StationError;

/// Name-indexed set of devices.
#[derive(Default)]
pub struct Registry {
    devices: RwLock<BTreeMap<String, Arc<dyn Device>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device` under its own name.
    pub fn register(&self, device: Arc<dyn Device>) -> Result<(), StationError> {
        let name = device.name().to_string();
        let mut devices = self.devices.write();
        if devices.contains_key(&name) {
            return Err(StationError::DuplicateDevice { name });
        }
        tracing::debug!(device = %name, "registered");
        devices.insert(name, device);
        Ok(())
    }

    /// Removes and returns the device named `name`.
    pub fn remove(&self, name: &str) -> Result<Arc<dyn Device>, StationError> {
        self.devices
            .write()
            .remove(name)
            .ok_or_else(|| StationError::UnknownDevice {
                name: name.to_string(),
            })
    }

    /// Looks up a device by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Device>> {
        self.devices.read().get(name).cloned()
    }

    /// Sorted list of registered names.
    pub fn list(&self) -> Vec<String> {
        self.devices.read().keys().cloned().collect()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Stops every device with the given `success` flag.
    pub fn stop_all(&self, success: bool) -> Result<(), StationError> {
        let devices: Vec<Arc<dyn Device>> = self.devices.read().values().cloned().collect();

        let mut failed = Vec::new();
        for device in devices {
            if let Err(err) = device.stop(success) {
                tracing::warn!(device = device.name(), error = %err, "stop failed");
                failed.push((device.name().to_string(), err));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(StationError::StopFailed { failed })
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::{DeviceError, SignalError};

    struct Probe {
        name: &'static str,
        fail: bool,
        stops: Mutex<Vec<bool>>,
    }

    impl Probe {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                stops: Mutex::new(Vec::new()),
            })
        }
    }

    impl Device for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn stop(&self, success: bool) -> Result<(), DeviceError> {
            self.stops.lock().push(success);
            if self.fail {
                return Err(SignalError::Closed {
                    channel: "Run".into(),
                }
                .into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let reg = Registry::new();
        reg.register(Probe::new("pump", false)).unwrap();
        let err = reg.register(Probe::new("pump", false)).unwrap_err();
        assert_eq!(err.as_label(), "station_duplicate_device");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_lookup_list_and_remove() {
        let reg = Registry::new();
        reg.register(Probe::new("sample_pump", false)).unwrap();
        reg.register(Probe::new("dg", false)).unwrap();

        assert_eq!(reg.list(), vec!["dg".to_string(), "sample_pump".to_string()]);
        assert!(reg.get("dg").is_some());
        assert!(reg.get("nope").is_none());

        reg.remove("dg").unwrap();
        assert_eq!(reg.remove("dg").err().map(|e| e.as_label()), Some("station_unknown_device"));
    }

    #[test]
    fn test_stop_all_visits_every_device() {
        let reg = Registry::new();
        let ok = Probe::new("ok", false);
        let bad = Probe::new("bad", true);
        reg.register(ok.clone()).unwrap();
        reg.register(bad.clone()).unwrap();

        let err = reg.stop_all(false).unwrap_err();
        match err {
            StationError::StopFailed { failed } => {
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].0, "bad");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*ok.stops.lock(), vec![false]);
        assert_eq!(*bad.stops.lock(), vec![false]);
    }
}
