//! Runtime services that drive the simulator.
//!
//! - `event_loop`: the `tokio::select!` loop over ticks, inbound commands
//!   and shutdown. Transport-agnostic, so it runs against `MockMqtt` in tests.
//! - `mqtt` feature: `rumqttc` client, event-loop driver and the
//!   broker-connected `MqttService`.

pub mod event_loop;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use event_loop::*;

#[cfg(feature = "mqtt")]
pub use mqtt::*;
