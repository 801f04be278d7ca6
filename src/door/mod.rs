//! Garage door state reconciliation and motion tracking.
//!
//! Maps vendor datapoint encodings onto a canonical door model, keeps the
//! target state in step with observed state, and turns target requests into
//! device commands.

pub mod controller;
pub mod motion;
pub mod notifier;
pub mod profile;
pub mod state;
pub mod translate;

pub use controller::GarageDoorController;
pub use profile::{DeviceProfile, VendorKind};
pub use state::{CurrentDoorState, DoorEvent, TargetDoorState};
