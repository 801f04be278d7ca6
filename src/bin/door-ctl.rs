//! Development tool for driving a bridged garage door over MQTT.
//!
//! Usage:
//!   cargo run --bin door-ctl -- open
//!   cargo run --bin door-ctl -- close
//!   cargo run --bin door-ctl -- watch
//!   cargo run --bin door-ctl -- refresh

use clap::{Parser, Subcommand};
use garage_door_bridge::config::{self, MqttConfig};
use garage_door_bridge::door::TargetDoorState;
use garage_door_bridge::input::mqtt::{DeviceTopics, MqttClient};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Default MQTT broker port
const DEFAULT_BROKER_PORT: u16 = 1883;

#[derive(Parser)]
#[command(name = "door-ctl")]
#[command(about = "Development tool for driving a bridged garage door over MQTT")]
struct Cli {
    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER_HOST", default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(long, env = "MQTT_BROKER_PORT", default_value_t = DEFAULT_BROKER_PORT)]
    port: u16,

    /// Base topic the bridge publishes under
    #[arg(long, env = "MQTT_BASE_TOPIC", default_value = "tuya")]
    base: String,

    /// Device id of the door
    #[arg(long, env = "DOOR_DEVICE_ID", default_value = "garage-door")]
    device: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the bridge to open the door (stops it if moving)
    Open,
    /// Ask the bridge to close the door (stops it if moving)
    Close,
    /// Print door state changes as they are published
    Watch,
    /// Ask the relay for a full datapoint report
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_dotenv();
    let cli = Cli::parse();

    let topics = DeviceTopics::new(&cli.base, &cli.device);
    let mqtt = MqttConfig {
        broker_host: cli.host.clone(),
        broker_port: cli.port,
        client_id: format!("door-ctl-{}", std::process::id()),
        username: std::env::var("MQTT_USERNAME").ok(),
        password: std::env::var("MQTT_PASSWORD").ok(),
        base_topic: cli.base.clone(),
    };

    println!("Connecting to MQTT broker at {}:{}...", cli.host, cli.port);

    let mqtt_client = MqttClient::new(&mqtt);
    let client = mqtt_client.client();
    let (msg_tx, mut msg_rx) = mpsc::channel(64);
    let (connected_tx, connected_rx) = oneshot::channel();

    let mqtt_loop = tokio::spawn(async move {
        mqtt_client.run(msg_tx, Some(connected_tx)).await;
    });

    if !matches!(
        tokio::time::timeout(Duration::from_secs(10), connected_rx).await,
        Ok(Ok(()))
    ) {
        eprintln!("Failed to connect to {}:{}", cli.host, cli.port);
        eprintln!("Make sure the broker is running and accessible.");
        mqtt_loop.abort();
        return Err("connection timeout".into());
    }

    println!("Connected!");

    match cli.command {
        Commands::Open | Commands::Close => {
            let target = match cli.command {
                Commands::Open => TargetDoorState::Open,
                _ => TargetDoorState::Closed,
            };
            let topic = topics.door_target_set();
            println!("Sending '{}' to {}", target, topic);
            client
                .publish(
                    &topic,
                    rumqttc::QoS::AtLeastOnce,
                    false,
                    target.to_string().into_bytes(),
                )
                .await?;
        }
        Commands::Refresh => {
            let topic = topics.dps_get();
            println!("Requesting datapoint report on {}", topic);
            client
                .publish(&topic, rumqttc::QoS::AtLeastOnce, false, "{}")
                .await?;
        }
        Commands::Watch => {
            for topic in [
                topics.door_current(),
                topics.door_target(),
                topics.door_obstruction(),
                topics.dps_state(),
            ] {
                client.subscribe(&topic, rumqttc::QoS::AtLeastOnce).await?;
            }
            println!("Watching door '{}' (Ctrl+C to exit)", cli.device);

            loop {
                tokio::select! {
                    msg = msg_rx.recv() => {
                        let Some(msg) = msg else { break };
                        println!("{} = {}", msg.topic, msg.payload);
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    // Give the event loop a moment to flush outgoing packets
    tokio::time::sleep(Duration::from_millis(500)).await;
    mqtt_loop.abort();

    Ok(())
}
