use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split .env content into key/value pairs, skipping blanks and comments.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            if !key.is_empty() {
                pairs.push((key, value));
            }
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub door: DoorConfig,
    pub mqtt: MqttConfig,
    /// Run against a simulated door instead of the MQTT datapoint relay.
    pub simulate: bool,
}

/// Raw per-door configuration, as the user wrote it.
///
/// Resolved once into an immutable `DeviceProfile` before the controller
/// starts processing reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorConfig {
    pub name: String,
    /// Device id used to build the datapoint relay topics.
    pub device_id: String,
    /// Free-text manufacturer, matched case-insensitively against known vendors.
    pub manufacturer: Option<String>,
    pub dp_action: Option<String>,
    pub dp_status: Option<String>,
    pub dp_alarm: Option<String>,
    pub dp_travel_time: Option<String>,
    /// Swap open/closed when the sensor is mounted the other way round.
    pub flip_state: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_topic: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            door: DoorConfig {
                name: "Garage Door".to_string(),
                device_id: "garage-door".to_string(),
                manufacturer: None,
                dp_action: None,
                dp_status: None,
                dp_alarm: None,
                dp_travel_time: None,
                flip_state: false,
            },
            mqtt: MqttConfig {
                broker_host: "10.0.0.2".to_string(),
                broker_port: 1883,
                client_id: "garage-door-bridge".to_string(),
                username: None,
                password: None,
                base_topic: "tuya".to_string(),
            },
            simulate: false,
        }
    }
}

/// Interpret common truthy spellings used in .env files.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Treat blank values as unset so an empty `DOOR_DP_STATUS=` keeps the vendor default.
fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Door configuration
        if let Ok(name) = std::env::var("DOOR_NAME") {
            config.door.name = name;
        }
        if let Ok(device_id) = std::env::var("DOOR_DEVICE_ID") {
            config.door.device_id = device_id;
        }
        if let Ok(manufacturer) = std::env::var("DOOR_MANUFACTURER") {
            config.door.manufacturer = non_empty(manufacturer);
        }
        if let Ok(dp) = std::env::var("DOOR_DP_ACTION") {
            config.door.dp_action = non_empty(dp);
        }
        if let Ok(dp) = std::env::var("DOOR_DP_STATUS") {
            config.door.dp_status = non_empty(dp);
        }
        if let Ok(dp) = std::env::var("DOOR_DP_ALARM") {
            config.door.dp_alarm = non_empty(dp);
        }
        if let Ok(dp) = std::env::var("DOOR_DP_TRAVEL_TIME") {
            config.door.dp_travel_time = non_empty(dp);
        }
        if let Ok(flip) = std::env::var("DOOR_FLIP_STATE") {
            config.door.flip_state = parse_flag(&flip);
        }
        if let Ok(simulate) = std::env::var("BRIDGE_SIMULATE") {
            config.simulate = parse_flag(&simulate);
        }

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Ok(base) = std::env::var("MQTT_BASE_TOPIC") {
            config.mqtt.base_topic = base.trim_end_matches('/').to_string();
        }

        config
    }

    /// Reject settings that would produce unusable MQTT topics.
    pub fn validate(&self) -> Result<()> {
        if self.door.device_id.trim().is_empty() {
            return Err(BridgeError::InvalidConfig("DOOR_DEVICE_ID is empty".into()));
        }
        for (name, value) in [
            ("DOOR_DEVICE_ID", self.door.device_id.as_str()),
            ("MQTT_BASE_TOPIC", self.mqtt.base_topic.as_str()),
        ] {
            if value.contains(['+', '#']) {
                return Err(BridgeError::InvalidConfig(format!(
                    "{} must not contain MQTT wildcards: {}",
                    name, value
                )));
            }
        }
        if self.door.device_id.contains('/') {
            return Err(BridgeError::InvalidConfig(format!(
                "DOOR_DEVICE_ID must be a single topic level: {}",
                self.door.device_id
            )));
        }
        Ok(())
    }
}
