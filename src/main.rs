use garage_door_bridge::config::{self, Config};
use garage_door_bridge::datapoint::DpChanges;
use garage_door_bridge::door::{DeviceProfile, GarageDoorController, TargetDoorState};
use garage_door_bridge::input::mqtt::GarageDoorIntegration;
use garage_door_bridge::input::simulation::run_door_simulation;
use garage_door_bridge::transport::MemoryTransport;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Travel time of the simulated door.
const SIMULATED_TRAVEL: Duration = Duration::from_secs(8);

/// Interval between automatic open/close requests in simulation mode.
const SIMULATED_TOGGLE_INTERVAL: Duration = Duration::from_secs(30);

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();

    init_logger();
    info!("Starting Garage Door Bridge");

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }
    let profile = DeviceProfile::resolve(&config.door);
    info!("Configuration loaded:");
    info!("  Door Name: {}", config.door.name);
    info!("  Vendor: {:?}", profile.vendor);
    info!(
        "  Datapoints: action={} status={} alarm={} travel_time={}",
        profile.action_dp,
        profile.status_dp,
        profile.alarm_dp,
        profile.travel_time_dp.as_deref().unwrap_or("-")
    );
    info!("  Flip State: {}", profile.flip_state);

    let tasks = if config.simulate {
        info!("  Mode: simulation");
        start_simulation(profile)
    } else {
        info!(
            "  MQTT Broker: {}:{} (base topic '{}')",
            config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.base_topic
        );
        vec![GarageDoorIntegration::new(config.mqtt, config.door).start()]
    };

    info!("Garage Door Bridge is running");
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    for task in tasks {
        task.abort();
    }

    info!("Garage Door Bridge stopped");
}

/// Wire a controller to a simulated door and toggle it periodically.
fn start_simulation(profile: DeviceProfile) -> Vec<JoinHandle<()>> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (report_tx, mut report_rx) = mpsc::channel::<DpChanges>(16);

    let transport = Arc::new(MemoryTransport::new().with_command_channel(command_tx));
    let controller = Arc::new(GarageDoorController::new(profile.clone(), transport.clone()));

    let simulator = run_door_simulation(
        profile,
        transport,
        command_rx,
        report_tx,
        SIMULATED_TRAVEL,
    );

    let reports_controller = controller.clone();
    let reports = tokio::spawn(async move {
        while let Some(changes) = report_rx.recv().await {
            reports_controller.handle_changes(&changes);
        }
    });

    let mut events = controller.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("[Sim] Door event: {:?}", event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("[Sim] Dropped {} door events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let toggle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SIMULATED_TOGGLE_INTERVAL);
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let target = match controller.target_state() {
                TargetDoorState::Open => TargetDoorState::Closed,
                TargetDoorState::Closed => TargetDoorState::Open,
            };
            info!("[Sim] Requesting door {}", target);
            if let Err(e) = controller.set_target_state(target).await {
                warn!("[Sim] Target state request failed: {}", e);
            }
        }
    });

    vec![simulator, reports, event_log, toggle]
}
