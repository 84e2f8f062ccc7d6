//! # iot-fleet-sim
//!
//! A simulated fleet of IoT devices that publishes telemetry, status and
//! alerts over MQTT and answers control commands.
//!
//! ## Features
//!
//! - **Device lifecycle**: Battery drain, random disconnects and recoveries
//! - **Synthetic telemetry**: Temperature, heart rate, gps position and bulb state
//! - **Threshold alerts**: Temperature readings above a per-device threshold
//! - **Remote control**: `SET_INTERVAL`, `SET_THRESHOLD`, `TURN_ON`/`TURN_OFF`, `RESET`
//!   with `ACK`/`NACK` responses
//!
//! ## Architecture
//!
//! The engine is plain synchronous code behind traits, so it runs in tests
//! without a broker:
//!
//! - `traits` - Transport, randomness and clock abstractions
//! - `device` / `registry` - The fleet and its per-device state
//! - `telemetry` / `lifecycle` - Reading generation and the per-tick state machine
//! - `commands` / `processor` - Command grammar and its application
//! - `simulator` - Ties everything together and publishes
//! - `scheduler` - The single publish timer
//! - `services` - The async loop and the `rumqttc` transport
//! - `hal` - Mock implementations for testing
//!
//! ## Example
//!
//! ```rust
//! use iot_fleet_sim::{
//!     DeviceRegistry, Simulator,
//!     hal::{MockClock, MockMqtt, MockRandom},
//! };
//!
//! let mut sim = Simulator::new(
//!     DeviceRegistry::demo_fleet(),
//!     MockMqtt::new(),
//!     MockRandom::constant(0.5),
//!     MockClock::new(),
//! );
//!
//! // Raise the threshold, then run a tick
//! let ack = sim.handle_command("temp-sensor-1", "SET_THRESHOLD:30").unwrap();
//! assert_eq!(ack.to_string(), "ACK: Threshold updated to 30°C");
//!
//! sim.tick();
//! let telemetry = sim.client().published_to("iot/temperature/temp-sensor-1");
//! assert_eq!(telemetry[0].json().unwrap()["value"], "27.50");
//! ```

#![warn(missing_docs)]

/// Control command grammar and acknowledgments.
pub mod commands;
/// Layered configuration (defaults, TOML file, environment).
pub mod config;
/// Simulated device records and their kinds.
pub mod device;
/// Error types.
pub mod error;
/// Mock implementations for testing.
pub mod hal;
/// Per-tick battery and connectivity state machine.
pub mod lifecycle;
/// Topics, payloads and alerts.
pub mod messages;
/// Command validation and application against the fleet.
pub mod processor;
/// The fleet, keyed by device id.
pub mod registry;
/// The single recurring publish timer.
pub mod scheduler;
/// The engine: ticks, command handling and publishing.
pub mod simulator;
/// Synthetic sensor readings.
pub mod telemetry;
/// Collaborator traits: MQTT client, random source, clock.
pub mod traits;

/// Async event loop and the MQTT transport.
pub mod services;

// Re-exports for convenience
pub use commands::{parse_command, Ack, Command, Nack};
pub use config::{Config, DeviceConfig, MqttConfig, SimulationConfig};
pub use device::{BulbState, Device, DeviceKind, DeviceType, GeoPoint, Status, TelemetryValue};
pub use error::{ConfigError, SimError};
pub use lifecycle::{DeviceStateMachine, Transition};
pub use messages::{Alert, Severity, StatusPayload, TelemetryPayload, Topics};
pub use processor::{CommandOutcome, CommandProcessor};
pub use registry::DeviceRegistry;
pub use scheduler::PublishScheduler;
pub use simulator::{Simulator, TickSummary};
pub use telemetry::{GpsMode, Reading, TelemetryGenerator};
pub use traits::{
    // Time
    Clock,
    // Network
    MqttClient,
    MqttMessage,
    Qos,
    // Randomness
    RandomSource,
    StdRandom,
    SystemClock,
};
