//! Input sources that drive the door controller.

pub mod mqtt;
pub mod simulation;
