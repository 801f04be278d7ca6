//! MQTT client wrapper for the datapoint relay.

use crate::config::MqttConfig;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// MQTT client for the datapoint relay.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Run the MQTT event loop and forward messages to the provided channel.
    ///
    /// Signals `connected` on the first ConnAck, then runs until the receiving
    /// side of `tx` is dropped. Connection errors are retried after a pause.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<MqttMessage>,
        mut connected: Option<oneshot::Sender<()>>,
    ) {
        info!("Starting MQTT event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("MQTT connected");
                    if let Some(signal) = connected.take() {
                        let _ = signal.send(());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.clone();
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("Invalid UTF-8 in MQTT payload: {}", e);
                            continue;
                        }
                    };

                    debug!("Received MQTT message on {}: {}", topic, payload);

                    let msg = MqttMessage { topic, payload };
                    if tx.send(msg).await.is_err() {
                        error!("MQTT message channel closed");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {:?}", e);
                    // Wait before reconnecting
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}
