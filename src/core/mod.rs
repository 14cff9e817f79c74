//! Station core: configuration, device registry and shutdown.
//!
//! Internal modules:
//! - [`config`]: station-wide settings shared by devices;
//! - [`registry`]: explicit name → device map;
//! - [`station`]: owns bus, subscribers and registry; handles OS signals;
//! - [`builder`]: assembles a [`Station`];
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod config;
mod registry;
mod shutdown;
mod station;

pub use builder::StationBuilder;
pub use config::Config;
pub use registry::Registry;
pub use station::Station;
