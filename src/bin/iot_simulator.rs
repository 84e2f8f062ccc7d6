//! Broker-connected fleet simulator.
//!
//! ```text
//! MQTT_HOST=localhost MQTT_PORT=1883 RUST_LOG=info cargo run --bin iot_simulator
//! ```
//!
//! Reads `.env`, then `iot-sim.toml` (or `$IOT_SIM_CONFIG`), then the
//! environment. Runs until Ctrl-C.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use iot_fleet_sim::services::MqttService;
use iot_fleet_sim::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        devices = config.devices.len(),
        interval_ms = config.simulation.interval_ms,
        "IoT fleet simulator starting"
    );

    let service = MqttService::from_config(&config).context("Failed to build simulator")?;

    let stats = service
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Simulation failed")?;

    info!(ticks = stats.ticks, polls = stats.polls, "bye");
    Ok(())
}
