//! Topic layout for one door on the broker.

/// Topics for a single device under the configured base topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    prefix: String,
}

impl DeviceTopics {
    pub fn new(base_topic: &str, device_id: &str) -> Self {
        Self {
            prefix: format!("{}/{}", base_topic.trim_end_matches('/'), device_id),
        }
    }

    /// Datapoint reports from the device, as a JSON object.
    pub fn dps_state(&self) -> String {
        format!("{}/dps/state", self.prefix)
    }

    /// Datapoint commands to the device, as a JSON object.
    pub fn dps_set(&self) -> String {
        format!("{}/dps/set", self.prefix)
    }

    /// Ask the relay for a full datapoint report.
    pub fn dps_get(&self) -> String {
        format!("{}/dps/get", self.prefix)
    }

    pub fn door_current(&self) -> String {
        format!("{}/door/current", self.prefix)
    }

    pub fn door_target(&self) -> String {
        format!("{}/door/target", self.prefix)
    }

    pub fn door_obstruction(&self) -> String {
        format!("{}/door/obstruction", self.prefix)
    }

    /// Target-state requests from users.
    pub fn door_target_set(&self) -> String {
        format!("{}/door/target/set", self.prefix)
    }
}
