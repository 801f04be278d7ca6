//! Datapoint transport over an MQTT relay.
//!
//! The relay publishes datapoint reports as JSON objects on the device's state
//! topic and accepts commands as JSON objects on its set topic. Reads are
//! answered from the last values seen on the state topic.

use super::topics::DeviceTopics;
use crate::datapoint::{DpChanges, DpValue, changes_to_json, parse_changes};
use crate::error::{BridgeError, Result};
use crate::transport::DatapointTransport;
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use rumqttc::{AsyncClient, QoS};

pub struct MqttDatapointTransport {
    client: AsyncClient,
    topics: DeviceTopics,
    last_known: RwLock<DpChanges>,
}

impl MqttDatapointTransport {
    pub fn new(client: AsyncClient, topics: DeviceTopics) -> Self {
        Self {
            client,
            topics,
            last_known: RwLock::new(DpChanges::new()),
        }
    }

    /// Parse a state-topic payload, remember its values and return the batch.
    ///
    /// Returns `None` for unparseable or empty reports.
    pub fn absorb(&self, payload: &str) -> Option<DpChanges> {
        let changes = match parse_changes(payload) {
            Ok(changes) => changes,
            Err(e) => {
                warn!("[MQTT] Failed to parse datapoint report: {}", e);
                return None;
            }
        };
        if changes.is_empty() {
            return None;
        }

        let mut last_known = self.last_known.write();
        for (dp, value) in &changes {
            last_known.insert(dp.clone(), value.clone());
        }
        Some(changes)
    }

    /// Ask the relay to publish a full report.
    pub async fn request_report(&self) -> Result<()> {
        self.client
            .publish(self.topics.dps_get(), QoS::AtLeastOnce, false, "{}")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DatapointTransport for MqttDatapointTransport {
    async fn get_state(&self, dp: &str) -> Result<DpValue> {
        self.last_known
            .read()
            .get(dp)
            .cloned()
            .ok_or_else(|| BridgeError::DatapointUnavailable(dp.to_string()))
    }

    async fn set_state(&self, dp: &str, value: DpValue) -> Result<()> {
        let mut command = DpChanges::new();
        command.insert(dp.to_string(), value);
        let payload = changes_to_json(&command);

        debug!("[MQTT] Sending {} to {}", payload, self.topics.dps_set());
        self.client
            .publish(self.topics.dps_set(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }
}
