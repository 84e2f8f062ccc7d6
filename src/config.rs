//! Simulator configuration.
//!
//! Values come from three layers, later ones winning:
//!
//! 1. Built-in defaults (the four-device demo fleet on `localhost:1883`)
//! 2. A TOML file, `iot-sim.toml` or the path in `IOT_SIM_CONFIG`
//! 3. Environment overrides: `MQTT_HOST`, `MQTT_PORT`, `IOT_SIM_INTERVAL_MS`
//!
//! # Example
//!
//! ```rust
//! use iot_fleet_sim::config::{Config, DeviceConfig, MqttConfig, SimulationConfig};
//! use iot_fleet_sim::device::DeviceType;
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.devices.len(), 4);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100"))
//!     .with_simulation(SimulationConfig::default().with_interval_ms(1000))
//!     .with_devices(vec![
//!         DeviceConfig::new("greenhouse-1", DeviceType::Temperature).with_threshold(32.0),
//!     ]);
//! config.validate().unwrap();
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceType};
use crate::error::{ConfigError, SimError};
use crate::lifecycle::DeviceStateMachine;
use crate::messages::Topics;
use crate::processor::{CommandProcessor, MIN_INTERVAL_MS};
use crate::registry::DeviceRegistry;
use crate::simulator::Simulator;
use crate::telemetry::GpsMode;
use crate::traits::{MqttClient, StdRandom, SystemClock};

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "IOT_SIM_CONFIG";

/// Config file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "iot-sim.toml";

// ============================================================================
// Main Config
// ============================================================================

/// Complete simulator configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection
    pub mqtt: MqttConfig,
    /// Timing and lifecycle tunables
    pub simulation: SimulationConfig,
    /// The fleet, in tick order
    pub devices: Vec<DeviceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            simulation: SimulationConfig::default(),
            devices: DeviceConfig::demo_fleet(),
        }
    }
}

impl Config {
    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set simulation configuration
    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    /// Replace the fleet
    pub fn with_devices(mut self, devices: Vec<DeviceConfig>) -> Self {
        self.devices = devices;
        self
    }

    /// Load from the default locations and the process environment.
    ///
    /// A missing `iot-sim.toml` means defaults; a path given through
    /// `IOT_SIM_CONFIG` must exist. The result is validated.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => {
                tracing::debug!("no config file, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file. Not validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&content)
    }

    /// Parse TOML. Missing sections and fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            self.mqtt.port = parse_env("MQTT_PORT", port)?;
        }
        if let Some(interval) = lookup("IOT_SIM_INTERVAL_MS") {
            self.simulation.interval_ms = parse_env("IOT_SIM_INTERVAL_MS", interval)?;
        }
        Ok(())
    }

    /// Check ranges and fleet consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;

        let mut seen = HashSet::new();
        for device in &self.devices {
            device.validate()?;
            if !seen.insert(device.id.as_str()) {
                return Err(invalid(format!("duplicate device id {:?}", device.id)));
            }
        }
        Ok(())
    }

    /// Build the fleet described by `devices`.
    pub fn build_registry(&self) -> Result<DeviceRegistry, SimError> {
        DeviceRegistry::from_devices(self.devices.iter().map(DeviceConfig::to_device))
    }

    /// Build a simulator over `client` with entropy-seeded (or configured
    /// seed) randomness and the system clock.
    pub fn build_simulator<C: MqttClient>(
        &self,
        client: C,
    ) -> Result<Simulator<C, StdRandom, SystemClock>, SimError> {
        let sim = &self.simulation;
        let simulator = Simulator::new(self.build_registry()?, client, sim.random(), SystemClock)
            .with_gps_mode(sim.gps_mode)
            .with_state_machine(sim.state_machine())
            .with_processor(sim.processor())
            .with_topics(Topics::new(self.mqtt.topic_root.as_str()))
            .with_status_every_tick(sim.status_every_tick)
            .with_interval(sim.interval());
        Ok(simulator)
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

// ============================================================================
// MQTT Config
// ============================================================================

/// Broker connection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client ID
    pub client_id: String,
    /// Root of every topic (e.g., "iot" -> "iot/status/<id>")
    pub topic_root: String,
    /// Username for authentication (`None` = no auth)
    pub username: Option<String>,
    /// Password for authentication
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Capacity of the client's outgoing request queue
    pub queue_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "iot-fleet-sim".to_string(),
            topic_root: "iot".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            queue_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = id.to_string();
        self
    }

    /// Set the topic root
    pub fn with_topic_root(mut self, root: &str) -> Self {
        self.topic_root = root.to_string();
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
    }
}

// ============================================================================
// Simulation Config
// ============================================================================

/// Timing, lifecycle and generation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Publish interval in milliseconds
    pub interval_ms: u64,
    /// Intervals must be strictly above this (also applies to `SET_INTERVAL`)
    pub min_interval_ms: u64,
    /// Gps movement model
    pub gps_mode: GpsMode,
    /// Publish a status snapshot for every device on every tick
    pub status_every_tick: bool,
    /// Upper bound of the per-tick battery drain
    pub max_drain: f64,
    /// Online devices below this battery level go offline
    pub low_battery: f64,
    /// Per-tick chance an online device disconnects
    pub disconnect_probability: f64,
    /// Per-tick chance an offline device recovers
    pub recovery_probability: f64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let machine = DeviceStateMachine::default();
        Self {
            interval_ms: 3000,
            min_interval_ms: MIN_INTERVAL_MS,
            gps_mode: GpsMode::default(),
            status_every_tick: false,
            max_drain: machine.max_drain,
            low_battery: machine.low_battery,
            disconnect_probability: machine.disconnect_probability,
            recovery_probability: machine.recovery_probability,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Set the publish interval
    pub fn with_interval_ms(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    /// Set the gps movement model
    pub fn with_gps_mode(mut self, mode: GpsMode) -> Self {
        self.gps_mode = mode;
        self
    }

    /// Publish status every tick
    pub fn with_status_every_tick(mut self, enabled: bool) -> Self {
        self.status_every_tick = enabled;
        self
    }

    /// Set the disconnect and recovery probabilities
    pub fn with_probabilities(mut self, disconnect: f64, recovery: f64) -> Self {
        self.disconnect_probability = disconnect;
        self.recovery_probability = recovery;
        self
    }

    /// Use a fixed RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Publish interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Lifecycle tunables
    pub fn state_machine(&self) -> DeviceStateMachine {
        DeviceStateMachine {
            max_drain: self.max_drain,
            low_battery: self.low_battery,
            disconnect_probability: self.disconnect_probability,
            recovery_probability: self.recovery_probability,
        }
    }

    /// Command processor with this interval floor
    pub fn processor(&self) -> CommandProcessor {
        CommandProcessor::new(self.min_interval_ms)
    }

    /// Random source, seeded if configured
    pub fn random(&self) -> StdRandom {
        match self.seed {
            Some(seed) => StdRandom::seeded(seed),
            None => StdRandom::from_entropy(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms <= self.min_interval_ms {
            return Err(invalid(format!(
                "interval_ms must be above {}, got {}",
                self.min_interval_ms, self.interval_ms
            )));
        }
        for (name, p) in [
            ("disconnect_probability", self.disconnect_probability),
            ("recovery_probability", self.recovery_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(format!("{name} must be within [0, 1], got {p}")));
            }
        }
        if !self.max_drain.is_finite() || self.max_drain < 0.0 {
            return Err(invalid(format!("max_drain must be >= 0, got {}", self.max_drain)));
        }
        if !(0.0..=100.0).contains(&self.low_battery) {
            return Err(invalid(format!(
                "low_battery must be within [0, 100], got {}",
                self.low_battery
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// One device of the fleet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique id, used as the last topic segment
    pub id: String,
    /// Device type
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Alert threshold (temperature sensors only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl DeviceConfig {
    /// A device of the given type with default settings
    pub fn new(id: &str, device_type: DeviceType) -> Self {
        Self {
            id: id.to_string(),
            device_type,
            threshold: None,
        }
    }

    /// Set the alert threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// The default four-device fleet
    pub fn demo_fleet() -> Vec<Self> {
        DeviceRegistry::demo_fleet()
            .iter()
            .map(|d| Self::new(d.id(), d.kind().device_type()))
            .collect()
    }

    /// Build the runtime device.
    pub fn to_device(&self) -> Device {
        let mut device = Device::new(self.id.as_str(), self.device_type.default_kind());
        if let Some(threshold) = self.threshold {
            device.set_threshold(threshold);
        }
        device
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() || self.id.contains(['/', '+', '#']) {
            return Err(invalid(format!(
                "device id {:?} must be a non-empty single topic segment",
                self.id
            )));
        }
        match (self.threshold, self.device_type) {
            (Some(t), DeviceType::Temperature) if !t.is_finite() => Err(invalid(format!(
                "threshold for {} must be a finite number",
                self.id
            ))),
            (Some(_), ty) if ty != DeviceType::Temperature => Err(invalid(format!(
                "threshold set on {} device {}",
                ty, self.id
            ))),
            _ => Ok(()),
        }
    }
}
