//! Mock collaborators for testing without a broker.
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockMqtt`] | [`MqttClient`] | Captures publishes, queues inbound messages |
//! | [`MockRandom`] | [`RandomSource`] | Scripted random sequence |
//! | [`MockClock`] | [`Clock`] | Controllable wall clock |
//!
//! # Example
//!
//! ```rust
//! use iot_fleet_sim::hal::{MockClock, MockMqtt, MockRandom};
//! use iot_fleet_sim::{DeviceRegistry, Simulator};
//!
//! let mut sim = Simulator::new(
//!     DeviceRegistry::demo_fleet(),
//!     MockMqtt::new(),
//!     MockRandom::constant(0.5),
//!     MockClock::new(),
//! );
//!
//! sim.client_mut().queue_message("iot/control/smart-bulb-1", "TURN_ON");
//! sim.poll();
//!
//! let acks = sim.client().published_to("iot/ack/smart-bulb-1");
//! assert_eq!(acks[0].payload_str(), Some("ACK: Bulb set to ON"));
//! ```
//!
//! [`MqttClient`]: crate::traits::MqttClient
//! [`RandomSource`]: crate::traits::RandomSource
//! [`Clock`]: crate::traits::Clock

use std::collections::VecDeque;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use crate::traits::{Clock, MqttClient, MqttMessage, Qos, RandomSource};

// ============================================================================
// Network Mocks
// ============================================================================

/// A message captured by [`MockMqtt::publish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    /// Topic.
    pub topic: String,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// Requested delivery guarantee.
    pub qos: Qos,
}

impl Published {
    /// Payload as UTF-8, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }

    /// Payload parsed as JSON, if valid.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

/// Mock MQTT client for testing.
///
/// Records all publish/subscribe operations and allows injecting
/// incoming messages. Set `fail_publishes` to make every publish fail.
///
/// ```rust
/// use iot_fleet_sim::hal::MockMqtt;
/// use iot_fleet_sim::traits::{MqttClient, Qos};
///
/// let mut mqtt = MockMqtt::new();
/// mqtt.queue_message("iot/control/vehicle-1", "SET_INTERVAL:1000");
/// assert_eq!(mqtt.try_recv().unwrap().topic, "iot/control/vehicle-1");
/// assert!(mqtt.try_recv().is_none());
///
/// mqtt.fail_publishes = true;
/// assert!(mqtt.publish("iot/ack/vehicle-1", b"ACK", Qos::AtMostOnce).is_err());
/// ```
#[derive(Debug, Default)]
pub struct MockMqtt {
    /// Messages that have been published, in order.
    pub published: Vec<Published>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Queue of incoming messages returned by `try_recv()` (FIFO).
    pub incoming: VecDeque<MqttMessage>,
    /// Whether the client is connected.
    pub connected: bool,
    /// When set, `publish` returns an error and records nothing.
    pub fail_publishes: bool,
    /// Number of publishes refused while `fail_publishes` was set.
    pub failed_publishes: usize,
}

impl MockMqtt {
    /// Creates a new mock MQTT client in connected state.
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Queue an incoming message.
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push_back(MqttMessage::new(topic, payload));
    }

    /// Check if a topic filter was subscribed to.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Published messages for a topic.
    pub fn published_to(&self, topic: &str) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    /// Published messages whose topic starts with `prefix`.
    pub fn published_under(&self, prefix: &str) -> Vec<&Published> {
        self.published
            .iter()
            .filter(|p| p.topic.starts_with(prefix))
            .collect()
    }

    /// Forget everything published so far.
    pub fn clear_published(&mut self) {
        self.published.clear();
    }
}

impl MqttClient for MockMqtt {
    type Error = &'static str;

    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), Self::Error> {
        if self.fail_publishes {
            self.failed_publishes += 1;
            return Err("mock publish failure");
        }
        self.published.push(Published {
            topic: topic.into(),
            payload: payload.to_vec(),
            qos,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        self.incoming.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ============================================================================
// Random Mock
// ============================================================================

/// Scripted random source.
///
/// Returns the queued values in order and cycles back to the start when it
/// runs out. Values are clamped into `[0, 1)`.
///
/// ```rust
/// use iot_fleet_sim::hal::MockRandom;
/// use iot_fleet_sim::traits::RandomSource;
///
/// let mut rng = MockRandom::new([0.1, 0.9]);
/// assert_eq!(rng.next_unit(), 0.1);
/// assert_eq!(rng.next_unit(), 0.9);
/// assert_eq!(rng.next_unit(), 0.1);
/// assert_eq!(rng.draws(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct MockRandom {
    values: Vec<f64>,
    cursor: usize,
    draws: usize,
}

impl MockRandom {
    /// Cycle through `values`. An empty sequence always yields `0.0`.
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            cursor: 0,
            draws: 0,
        }
    }

    /// Always return `value`.
    pub fn constant(value: f64) -> Self {
        Self::new([value])
    }

    /// Replace the remaining script.
    pub fn script(&mut self, values: impl IntoIterator<Item = f64>) {
        self.values = values.into_iter().collect();
        self.cursor = 0;
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl Default for MockRandom {
    fn default() -> Self {
        Self::constant(0.5)
    }
}

impl RandomSource for MockRandom {
    fn next_unit(&mut self) -> f64 {
        self.draws += 1;
        let Some(&value) = self.values.get(self.cursor) else {
            return 0.0;
        };
        self.cursor = (self.cursor + 1) % self.values.len();
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

// ============================================================================
// Clock Mock
// ============================================================================

/// Mock wall clock, starting at 2025-01-01T00:00:00Z.
#[derive(Clone, Copy, Debug)]
pub struct MockClock {
    now: DateTime<Utc>,
}

impl MockClock {
    /// Creates a clock at the fixed start instant.
    pub fn new() -> Self {
        Self {
            now: Utc
                .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    /// Sets the current time.
    pub fn set(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    /// Advances the clock by the given number of milliseconds.
    pub fn advance_ms(&mut self, ms: i64) {
        self.now += ChronoDuration::milliseconds(ms);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
