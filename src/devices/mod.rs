//! Hardware devices.
//!
//! - [`Device`], [`Flyer`], [`Phase`]   device traits and lifecycle phase
//! - [`SyringePump`]                    state + volume driven flyer
//! - [`SamplePump`]                     slew/stop flyer with confirmation timeout
//! - [`DelayGenerator`]                 retry-guarded delay setpoint

mod delay;
mod flyer;
mod sample;
mod syringe;

pub use delay::{DelayGenerator, DelaySignals};
pub use flyer::{Device, Flyer, Phase};
pub use sample::{SamplePump, SampleSignals, SampleState};
pub use syringe::{PumpSignals, PumpState, SyringePump};
