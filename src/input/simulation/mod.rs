//! Simulated devices for running the bridge without hardware.

mod door;

pub use door::run_door_simulation;
