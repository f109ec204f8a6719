// ── Capabilities ──
//
// Per-reading accessors composed onto the controller. Each trait runs the
// same existence, readiness, classification check before touching values.

mod dimmers;
mod sensors;

pub use dimmers::{DimmerControl, MAX_DIMMER_LEVEL};
pub use sensors::SensorReadings;
