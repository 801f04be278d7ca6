//! MQTT integration orchestrator for a garage door.
//!
//! Connects to the broker, feeds datapoint reports into the door controller,
//! publishes door state changes as retained topics, and executes target-state
//! requests. Keeps MQTT internals out of main.rs.

use super::client::{MqttClient, MqttMessage};
use super::datapoints::MqttDatapointTransport;
use super::topics::DeviceTopics;
use crate::config::{DoorConfig, MqttConfig};
use crate::datapoint::DpChanges;
use crate::door::{DeviceProfile, DoorEvent, GarageDoorController, TargetDoorState};
use log::{debug, info, warn};
use rumqttc::{AsyncClient, QoS};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Retained topic and payload announcing a door change.
pub fn event_publication(topics: &DeviceTopics, event: DoorEvent) -> (String, String) {
    match event {
        DoorEvent::CurrentState(state) => (topics.door_current(), state.to_string()),
        DoorEvent::TargetState(target) => (topics.door_target(), target.to_string()),
        DoorEvent::Obstruction(obstructed) => (topics.door_obstruction(), obstructed.to_string()),
    }
}

/// Parse a target-state request payload (`open`, `closed`, `close`).
pub fn parse_target_request(payload: &str) -> Option<TargetDoorState> {
    TargetDoorState::from_str(payload.trim()).ok()
}

pub struct GarageDoorIntegration {
    mqtt: MqttConfig,
    door: DoorConfig,
}

impl GarageDoorIntegration {
    pub fn new(mqtt: MqttConfig, door: DoorConfig) -> Self {
        Self { mqtt, door }
    }

    /// Start the integration.
    ///
    /// Spawns a background task that connects to the broker, subscribes to the
    /// door's topics, and routes messages. Returns a JoinHandle that can be
    /// used to abort the task on shutdown.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let topics = DeviceTopics::new(&self.mqtt.base_topic, &self.door.device_id);
        let profile = DeviceProfile::resolve(&self.door);

        info!(
            "[MQTT] Connecting to {}:{} for door '{}'",
            self.mqtt.broker_host, self.mqtt.broker_port, self.door.name
        );

        let mqtt_client = MqttClient::new(&self.mqtt);
        let client = mqtt_client.client();

        let (msg_tx, mut msg_rx) = mpsc::channel::<MqttMessage>(64);
        let (connected_tx, connected_rx) = oneshot::channel();

        // Start MQTT event loop FIRST (so it can establish connection)
        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(msg_tx, Some(connected_tx)).await;
        });

        match tokio::time::timeout(Duration::from_secs(10), connected_rx).await {
            Ok(Ok(())) => {
                info!("[MQTT] Connection established, subscribing to topics");
            }
            Ok(Err(_)) => {
                warn!("[MQTT] Connection signal channel dropped");
                return;
            }
            Err(_) => {
                warn!("[MQTT] Connection timeout after 10 seconds");
                mqtt_loop.abort();
                return;
            }
        }

        for topic in [topics.dps_state(), topics.door_target_set()] {
            if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce).await {
                warn!("[MQTT] Failed to subscribe to {}: {:?}", topic, e);
            }
        }

        let transport = Arc::new(MqttDatapointTransport::new(client.clone(), topics.clone()));
        let controller = Arc::new(GarageDoorController::new(profile, transport.clone()));
        let events = controller.subscribe();

        let publisher = tokio::spawn(publish_events(client.clone(), topics.clone(), events));

        // Requests run off the message loop so reports keep flowing, one at a time in arrival order
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let commands = tokio::spawn(run_target_requests(controller.clone(), request_rx));

        // Small delay to ensure subscriptions are processed before requesting state
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Err(e) = transport.request_report().await {
            warn!("[MQTT] Failed to request initial datapoints: {}", e);
        }

        // Publish the starting state so retained topics are never empty
        for event in [
            DoorEvent::CurrentState(controller.current_state()),
            DoorEvent::TargetState(controller.target_state()),
            DoorEvent::Obstruction(controller.is_obstructed()),
        ] {
            publish_event(&client, &topics, event).await;
        }

        info!("[MQTT] Integration started for door '{}'", self.door.name);

        let mut synced = false;
        while let Some(msg) = msg_rx.recv().await {
            if msg.topic == topics.dps_state() {
                if let Some(changes) = transport.absorb(&msg.payload) {
                    apply_report(&controller, &changes, &mut synced).await;
                }
            } else if msg.topic == topics.door_target_set() {
                match parse_target_request(&msg.payload) {
                    Some(target) => {
                        info!("[MQTT] Target state request: {}", target);
                        if request_tx.send(target).is_err() {
                            warn!("[MQTT] Command worker stopped, dropping request");
                        }
                    }
                    None => warn!("[MQTT] Unknown target state request: {}", msg.payload),
                }
            }
        }

        commands.abort();
        publisher.abort();
        mqtt_loop.abort();
    }
}

/// Apply a datapoint report that the transport has already cached.
///
/// Until the door has been synced once, the whole cached state is applied
/// through `refresh`; a report without the status datapoint is applied as is
/// and the sync is retried with the next one.
async fn apply_report(controller: &GarageDoorController, changes: &DpChanges, synced: &mut bool) {
    if *synced {
        controller.handle_changes(changes);
        return;
    }

    match controller.refresh().await {
        Ok(()) => {
            *synced = true;
            info!(
                "[MQTT] Initial door state synced: {} (target {})",
                controller.current_state(),
                controller.target_state()
            );
        }
        Err(e) => {
            debug!("[MQTT] Initial sync deferred: {}", e);
            controller.handle_changes(changes);
        }
    }
}

/// Execute target-state requests one after the other until the sender goes away.
async fn run_target_requests(
    controller: Arc<GarageDoorController>,
    mut requests: mpsc::UnboundedReceiver<TargetDoorState>,
) {
    while let Some(target) = requests.recv().await {
        if let Err(e) = controller.set_target_state(target).await {
            warn!("[MQTT] Target state request failed: {}", e);
        }
    }
}

async fn publish_event(client: &AsyncClient, topics: &DeviceTopics, event: DoorEvent) {
    let (topic, payload) = event_publication(topics, event);
    if let Err(e) = client
        .publish(&topic, QoS::AtLeastOnce, true, payload.as_bytes())
        .await
    {
        warn!("[MQTT] Failed to publish {}: {:?}", topic, e);
    }
}

/// Forward door change events to their retained topics until the controller goes away.
async fn publish_events(
    client: AsyncClient,
    topics: DeviceTopics,
    mut events: broadcast::Receiver<DoorEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => publish_event(&client, &topics, event).await,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("[MQTT] Dropped {} door events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
