//! MQTT input source for relayed Tuya datapoints.
//!
//! This module provides MQTT client functionality to exchange datapoints with
//! a relay that owns the device link, and to expose the door state on the
//! broker.

mod client;
mod datapoints;
mod integration;
mod topics;

pub use client::{MqttClient, MqttMessage};
pub use datapoints::MqttDatapointTransport;
pub use integration::{GarageDoorIntegration, event_publication, parse_target_request};
pub use topics::DeviceTopics;
