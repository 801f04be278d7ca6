//! Garage Door Bridge library.
//!
//! Reconciles the datapoints reported by Tuya-style garage door controllers
//! into a canonical door state, tracks door motion with a safety timeout,
//! and translates target-state requests into vendor commands.

pub mod config;
pub mod datapoint;
pub mod door;
pub mod error;
pub mod input;
pub mod transport;
