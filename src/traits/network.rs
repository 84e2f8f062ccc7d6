//! Publish/subscribe transport abstraction.
//!
//! The simulator never talks to a broker directly. Everything it emits
//! (status, telemetry, alerts, acks) goes through [`MqttClient::publish`], and
//! every control command arrives through [`MqttClient::try_recv`]. This keeps
//! the engine testable with [`MockMqtt`](crate::hal::MockMqtt) and lets the
//! `mqtt` feature plug in a `rumqttc` client.
//!
//! # Topic Layout
//!
//! ```text
//! iot/status/<deviceId>   - Status snapshot JSON (on transitions)
//! iot/<type>/<deviceId>   - Telemetry JSON (every tick, online devices)
//! iot/alert/<deviceId>    - Plain-text alert
//! iot/control/<deviceId>  - Inbound command "VERB[:PARAM]"
//! iot/ack/<deviceId>      - Outbound "ACK: ..." / "NACK: ..."
//! ```

use core::fmt;

// ============================================================================
// MQTT Client Trait
// ============================================================================

/// Delivery guarantee requested for a publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Qos {
    /// Fire once, no broker acknowledgment.
    #[default]
    AtMostOnce,
    /// Broker acknowledges; may be delivered more than once.
    AtLeastOnce,
}

/// MQTT client trait for pub/sub messaging.
///
/// Publishes are fire-and-forget: an implementation queues the message and
/// returns without waiting for the broker. A returned error means the
/// message was not queued at all; callers log it and move on.
///
/// # Example
///
/// ```rust
/// use iot_fleet_sim::hal::MockMqtt;
/// use iot_fleet_sim::traits::{MqttClient, Qos};
///
/// let mut client = MockMqtt::new();
/// client.publish("iot/ack/smart-bulb-1", b"ACK: Bulb set to ON", Qos::AtMostOnce).unwrap();
/// assert_eq!(client.published_to("iot/ack/smart-bulb-1").len(), 1);
/// ```
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: fmt::Display;

    /// Queue a message for publishing.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), Self::Error>;

    /// Subscribe to a topic filter.
    ///
    /// Supports wildcards: `iot/control/#` or `iot/+/vehicle-1`
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Try to receive the next inbound message (non-blocking).
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Check if connected to broker.
    fn is_connected(&self) -> bool;
}

/// A message received from a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_str_valid() {
        let msg = MqttMessage::new("iot/control/smart-bulb-1", "TURN_ON");
        assert_eq!(msg.payload_str(), Some("TURN_ON"));
    }

    #[test]
    fn payload_str_invalid_utf8() {
        let msg = MqttMessage::new("iot/control/smart-bulb-1", vec![0xFF, 0xFE]);
        assert!(msg.payload_str().is_none());
    }

    #[test]
    fn qos_default_is_at_most_once() {
        assert_eq!(Qos::default(), Qos::AtMostOnce);
    }
}
