//! Trait definitions for the simulator's external collaborators.
//!
//! These abstractions allow the engine to:
//! - Publish and receive over any broker client
//! - Draw randomness from a scripted source in tests
//! - Stamp payloads with a controllable clock
//!
//! # Submodules
//!
//! - `network`: MQTT client trait and message type
//! - `random`: Random source used by telemetry and the device lifecycle
//! - `clock`: Timestamp source

pub mod clock;
pub mod network;
pub mod random;

pub use clock::*;
pub use network::*;
pub use random::*;
