//! The simulation engine.
//!
//! [`Simulator`] owns the fleet and its collaborators and turns timer ticks
//! and control messages into publishes. It never sleeps or spawns: the caller
//! drives it, either from the async loop in
//! [`services::mqtt`](crate::services) or directly from tests.
//!
//! # Tick Sequence
//!
//! For every device, in registry order:
//!
//! 1. Advance the lifecycle. On a transition publish the alert, then a status
//!    snapshot (also every tick when `status_every_tick` is set).
//! 2. Generate a reading (online devices only), remember it and publish the
//!    telemetry payload.
//! 3. For temperature sensors, publish a threshold alert when the reading is
//!    strictly above the threshold.
//!
//! A failed publish is logged and counted; it never skips the remaining
//! devices.
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
//! let summary = sim.tick();
//! assert_eq!(summary.telemetry, 4);
//! assert_eq!(sim.client().published_to("iot/temperature/temp-sensor-1").len(), 1);
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::commands::{parse_command, Ack};
use crate::device::Device;
use crate::error::SimError;
use crate::lifecycle::DeviceStateMachine;
use crate::messages::{Alert, StatusPayload, TelemetryPayload, Topics};
use crate::processor::CommandProcessor;
use crate::registry::DeviceRegistry;
use crate::scheduler::DEFAULT_PERIOD;
use crate::telemetry::{GpsMode, Reading, TelemetryGenerator};
use crate::traits::{Clock, MqttClient, MqttMessage, Qos, RandomSource};

// ============================================================================
// Tick Summary
// ============================================================================

/// Counts of what one [`Simulator::tick`] published.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Telemetry payloads published.
    pub telemetry: usize,
    /// Status snapshots published.
    pub status: usize,
    /// Alerts published.
    pub alerts: usize,
    /// Publishes the client refused.
    pub failures: usize,
}

impl TickSummary {
    fn record(&mut self, result: Result<(), SimError>, counter: fn(&mut Self) -> &mut usize) {
        match result {
            Ok(()) => *counter(self) += 1,
            Err(err) => {
                tracing::warn!(error = %err, "publish failed");
                self.failures += 1;
            }
        }
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Borrowed view of the outbound side: client, clock and topic layout.
///
/// Split out so a tick can hold `&mut Device` from the registry while
/// publishing through the client.
struct Publisher<'a, C, K> {
    client: &'a mut C,
    clock: &'a K,
    topics: &'a Topics,
}

impl<C: MqttClient, K: Clock> Publisher<'_, C, K> {
    fn send(&mut self, topic: String, payload: &[u8], qos: Qos) -> Result<(), SimError> {
        self.client
            .publish(&topic, payload, qos)
            .map_err(|e| SimError::Publish {
                topic,
                reason: e.to_string(),
            })
    }

    fn send_json<T: Serialize>(&mut self, topic: String, payload: &T) -> Result<(), SimError> {
        let bytes = serde_json::to_vec(payload)?;
        self.send(topic, &bytes, Qos::AtMostOnce)
    }

    fn status(&mut self, device: &Device) -> Result<(), SimError> {
        let payload = StatusPayload::from_device(device, self.clock.timestamp());
        tracing::debug!(device = device.id(), status = %device.status(), "status");
        self.send_json(self.topics.status(device.id()), &payload)
    }

    fn telemetry(&mut self, device: &Device, reading: &Reading) -> Result<(), SimError> {
        let payload = TelemetryPayload::from_device(device, reading.to_value(), self.clock.timestamp());
        tracing::debug!(device = device.id(), value = %payload.value, "telemetry");
        self.send_json(self.topics.telemetry(device.type_name(), device.id()), &payload)
    }

    fn alert(&mut self, alert: &Alert) -> Result<(), SimError> {
        tracing::info!(device = %alert.device_id, severity = ?alert.severity, "{}", alert.text);
        self.send(
            self.topics.alert(&alert.device_id),
            alert.text.as_bytes(),
            Qos::AtLeastOnce,
        )
    }

    fn ack(&mut self, device_id: &str, ack: &Ack) -> Result<(), SimError> {
        let text = ack.to_string();
        tracing::info!(device = device_id, "{text}");
        self.send(self.topics.ack(device_id), text.as_bytes(), Qos::AtMostOnce)
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Fleet simulation engine, generic over its transport, randomness and clock.
pub struct Simulator<C, R, K> {
    registry: DeviceRegistry,
    client: C,
    rng: R,
    clock: K,
    generator: TelemetryGenerator,
    machine: DeviceStateMachine,
    processor: CommandProcessor,
    topics: Topics,
    status_every_tick: bool,
    interval: Duration,
    pending_interval: Option<Duration>,
}

impl<C, R, K> Simulator<C, R, K>
where
    C: MqttClient,
    R: RandomSource,
    K: Clock,
{
    /// Create an engine with default tunables, topics under `iot/` and a
    /// 3000 ms publish interval.
    pub fn new(registry: DeviceRegistry, client: C, rng: R, clock: K) -> Self {
        Self {
            registry,
            client,
            rng,
            clock,
            generator: TelemetryGenerator::default(),
            machine: DeviceStateMachine::default(),
            processor: CommandProcessor::default(),
            topics: Topics::default(),
            status_every_tick: false,
            interval: DEFAULT_PERIOD,
            pending_interval: None,
        }
    }

    /// Set the gps movement mode.
    pub fn with_gps_mode(mut self, mode: GpsMode) -> Self {
        self.generator = TelemetryGenerator::new(mode);
        self
    }

    /// Set the lifecycle tunables.
    pub fn with_state_machine(mut self, machine: DeviceStateMachine) -> Self {
        self.machine = machine;
        self
    }

    /// Set the command processor (interval floor).
    pub fn with_processor(mut self, processor: CommandProcessor) -> Self {
        self.processor = processor;
        self
    }

    /// Set the topic root.
    pub fn with_topics(mut self, topics: Topics) -> Self {
        self.topics = topics;
        self
    }

    /// Publish a status snapshot for every device on every tick.
    pub fn with_status_every_tick(mut self, enabled: bool) -> Self {
        self.status_every_tick = enabled;
        self
    }

    /// Set the initial publish interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The fleet.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The transport.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The transport, mutably (tests use this to queue inbound messages).
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// The clock, mutably.
    pub fn clock_mut(&mut self) -> &mut K {
        &mut self.clock
    }

    /// The topic layout.
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Current publish interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn publisher(&mut self) -> Publisher<'_, C, K> {
        Publisher {
            client: &mut self.client,
            clock: &self.clock,
            topics: &self.topics,
        }
    }

    // ------------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------------

    /// Advance every device by one tick and publish the results.
    pub fn tick(&mut self) -> TickSummary {
        let mut summary = TickSummary::default();
        let mut out = Publisher {
            client: &mut self.client,
            clock: &self.clock,
            topics: &self.topics,
        };

        for device in self.registry.iter_mut() {
            let transition = self.machine.tick(device, &mut self.rng);

            if let Some(transition) = transition {
                let alert = Alert::new(device.id(), transition.alert_text(device.id()));
                summary.record(out.alert(&alert), |s| &mut s.alerts);
            }
            if transition.is_some() || self.status_every_tick {
                summary.record(out.status(device), |s| &mut s.status);
            }

            let Some(reading) = self.generator.generate(device, &mut self.rng) else {
                continue;
            };

            if let Reading::Position(position) = reading {
                if self.generator.gps_mode() == GpsMode::Walk {
                    device.set_position(position);
                }
            }
            device.set_last_value(reading.to_value());
            summary.record(out.telemetry(device, &reading), |s| &mut s.telemetry);

            if let (Some(value), Some(threshold)) = (reading.temperature(), device.threshold()) {
                if value > threshold {
                    let alert = Alert::threshold_exceeded(device, &reading.to_value(), threshold);
                    summary.record(out.alert(&alert), |s| &mut s.alerts);
                }
            }
        }

        tracing::debug!(
            telemetry = summary.telemetry,
            status = summary.status,
            alerts = summary.alerts,
            failures = summary.failures,
            "tick complete"
        );
        summary
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Handle a raw command addressed to `device_id`.
    ///
    /// Publishes the ack (and, for bulb commands, the device's telemetry) and
    /// returns it. Returns `None`, publishing nothing, for unknown devices.
    /// An accepted interval change is recorded for [`take_reschedule`].
    ///
    /// [`take_reschedule`]: Simulator::take_reschedule
    pub fn handle_command(&mut self, device_id: &str, raw: &str) -> Option<Ack> {
        let command = parse_command(raw);
        let Some(outcome) = self.processor.apply(&mut self.registry, device_id, &command) else {
            tracing::debug!(device = device_id, command = raw, "command for unknown device dropped");
            return None;
        };

        if let Some(period) = outcome.reschedule {
            self.interval = period;
            self.pending_interval = Some(period);
        }

        if let Err(err) = self.publisher().ack(device_id, &outcome.ack) {
            tracing::warn!(error = %err, "ack publish failed");
        }

        if outcome.republish {
            self.republish(device_id);
        }

        Some(outcome.ack)
    }

    /// Publish one device's telemetry outside the tick cycle.
    fn republish(&mut self, device_id: &str) {
        let Some(device) = self.registry.get_mut(device_id) else {
            return;
        };
        let Some(reading) = self.generator.generate(device, &mut self.rng) else {
            return;
        };
        device.set_last_value(reading.to_value());

        let mut out = Publisher {
            client: &mut self.client,
            clock: &self.clock,
            topics: &self.topics,
        };
        if let Err(err) = out.telemetry(device, &reading) {
            tracing::warn!(error = %err, "telemetry republish failed");
        }
    }

    /// Route one inbound message.
    ///
    /// Messages outside `<root>/control/<id>` or with a non-UTF-8 payload are
    /// logged and dropped.
    pub fn handle_message(&mut self, message: &MqttMessage) -> Option<Ack> {
        let Some(device_id) = self.topics.device_from_control(&message.topic) else {
            tracing::warn!(topic = %message.topic, "message on unexpected topic dropped");
            return None;
        };
        let Some(raw) = message.payload_str() else {
            tracing::warn!(topic = %message.topic, "non-UTF-8 command payload dropped");
            return None;
        };

        tracing::info!(device = device_id, command = raw, "command received");
        self.handle_command(device_id, raw)
    }

    /// Drain and handle every pending inbound message.
    ///
    /// Returns the new publish interval if any command changed it; when
    /// several did, the last one wins.
    pub fn poll(&mut self) -> Option<Duration> {
        while let Some(message) = self.client.try_recv() {
            self.handle_message(&message);
        }
        self.take_reschedule()
    }

    /// Take the interval change recorded since the last call, if any.
    pub fn take_reschedule(&mut self) -> Option<Duration> {
        self.pending_interval.take()
    }

    /// Subscribe to every device's control topic.
    pub fn subscribe_control_topics(&mut self) -> Result<(), SimError> {
        let filter = self.topics.control_filter();
        self.client
            .subscribe(&filter)
            .map_err(|e| SimError::Subscribe {
                topic: filter.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(topic = %filter, "subscribed to control topics");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BulbState, DeviceKind, Status};
    use crate::hal::{MockClock, MockMqtt, MockRandom};

    type TestSim = Simulator<MockMqtt, MockRandom, MockClock>;

    fn sim(registry: DeviceRegistry, rng: MockRandom) -> TestSim {
        Simulator::new(registry, MockMqtt::new(), rng, MockClock::new())
    }

    fn single(id: &str, kind: DeviceKind) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.add(id, kind).unwrap();
        registry
    }

    // =========================================================================
    // Tick
    // =========================================================================

    #[test]
    fn quiet_tick_publishes_telemetry_only() {
        // 0.5: drain 1.0, no disconnect, mid-range readings
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        let summary = sim.tick();

        assert_eq!(summary, TickSummary { telemetry: 4, ..Default::default() });
        let client = sim.client();
        assert_eq!(client.published.len(), 4);
        assert!(client.published_under("iot/status/").is_empty());
        assert!(client.published_under("iot/alert/").is_empty());
        assert_eq!(client.published_to("iot/heartRate/heart-monitor-1").len(), 1);
        assert_eq!(client.published_to("iot/bulb/smart-bulb-1").len(), 1);
        assert_eq!(client.published_to("iot/gps/vehicle-1").len(), 1);
    }

    #[test]
    fn telemetry_payload_reflects_device() {
        let mut sim = sim(single("heart-monitor-1", DeviceKind::HeartRate), MockRandom::constant(0.5));
        sim.tick();

        let msg = sim.client().published_to("iot/heartRate/heart-monitor-1")[0];
        assert_eq!(msg.qos, Qos::AtMostOnce);
        let json = msg.json().unwrap();
        assert_eq!(json["deviceId"], "heart-monitor-1");
        assert_eq!(json["type"], "heartRate");
        assert_eq!(json["value"], 80);
        assert_eq!(json["unit"], "bpm");
        assert_eq!(json["battery"], 99.0);
        assert_eq!(json["status"], "ONLINE");
        assert_eq!(json["timestamp"], "2025-01-01T00:00:00.000Z");

        let device = sim.registry().get("heart-monitor-1").unwrap();
        assert_eq!(device.last_value().map(|v| v.to_string()), Some("80".into()));
    }

    #[test]
    fn disconnect_publishes_alert_and_status_but_no_telemetry() {
        // drain 0, disconnect roll 0.0 fires
        let mut sim = sim(single("vehicle-1", DeviceKind::gps()), MockRandom::constant(0.0));
        let summary = sim.tick();

        assert_eq!(summary.alerts, 1);
        assert_eq!(summary.status, 1);
        assert_eq!(summary.telemetry, 0);

        let alert = sim.client().published_to("iot/alert/vehicle-1")[0];
        assert_eq!(alert.payload_str(), Some("ALERT: vehicle-1 randomly disconnected"));
        assert_eq!(alert.qos, Qos::AtLeastOnce);

        let status = sim.client().published_to("iot/status/vehicle-1")[0].json().unwrap();
        assert_eq!(status["status"], "OFFLINE");
        assert!(sim.client().published_to("iot/gps/vehicle-1").is_empty());
    }

    #[test]
    fn recovery_publishes_info_and_telemetry_with_full_battery() {
        let registry = DeviceRegistry::from_devices([Device::new("heart-monitor-1", DeviceKind::HeartRate)
            .with_status(Status::Offline)
            .with_battery(4.0)])
        .unwrap();
        // drain 0, recovery roll 0 fires, reading 60
        let mut sim = sim(registry, MockRandom::constant(0.0));
        sim.tick();

        let alert = sim.client().published_to("iot/alert/heart-monitor-1")[0];
        assert_eq!(alert.payload_str(), Some("INFO: heart-monitor-1 recovered and is ONLINE"));

        let telemetry = sim.client().published_to("iot/heartRate/heart-monitor-1")[0].json().unwrap();
        assert_eq!(telemetry["battery"], 100.0);
        assert_eq!(telemetry["status"], "ONLINE");
    }

    #[test]
    fn offline_device_stays_silent() {
        let registry = DeviceRegistry::from_devices([
            Device::new("temp-sensor-1", DeviceKind::temperature()).with_status(Status::Offline)
        ])
        .unwrap();
        // drain 1.0, recovery roll 0.5 misses
        let mut sim = sim(registry, MockRandom::constant(0.5));
        let summary = sim.tick();

        assert_eq!(summary, TickSummary::default());
        assert!(sim.client().published.is_empty());
    }

    #[test]
    fn threshold_alert_is_strict() {
        // sequence: drain, disconnect roll, reading
        let registry = single("temp-sensor-1", DeviceKind::Temperature { threshold: 27.5 });
        let mut sim = sim(registry, MockRandom::new([0.5, 0.9, 0.5]));
        sim.tick();
        // reading 27.50 is not above 27.5
        assert!(sim.client().published_to("iot/alert/temp-sensor-1").is_empty());

        sim.client_mut().clear_published();
        sim.rng.script([0.5, 0.9, 0.6]);
        sim.tick();
        let alerts = sim.client().published_to("iot/alert/temp-sensor-1");
        assert_eq!(alerts.len(), 1);
        assert_eq!(
            alerts[0].payload_str(),
            Some("ALERT: temp-sensor-1 exceeded threshold (29.00°C > 27.5°C)")
        );
    }

    #[test]
    fn status_every_tick() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5)).with_status_every_tick(true);
        let summary = sim.tick();
        assert_eq!(summary.status, 4);
        assert_eq!(sim.client().published_under("iot/status/").len(), 4);
    }

    #[test]
    fn gps_walk_moves_device() {
        let mut sim = sim(single("vehicle-1", DeviceKind::gps()), MockRandom::new([0.5, 0.9, 1.0, 1.0]))
            .with_gps_mode(GpsMode::Walk);
        sim.tick();
        let position = sim.registry().get("vehicle-1").unwrap().position().unwrap();
        assert!(position.lat > 28.6);
        assert!(position.lng > 77.2);
    }

    #[test]
    fn gps_jitter_keeps_origin() {
        let mut sim = sim(single("vehicle-1", DeviceKind::gps()), MockRandom::new([0.5, 0.9, 1.0, 1.0]));
        sim.tick();
        let position = sim.registry().get("vehicle-1").unwrap().position().unwrap();
        assert_eq!(position, crate::device::GeoPoint::ORIGIN);
    }

    #[test]
    fn publish_failure_does_not_skip_devices() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        sim.client_mut().fail_publishes = true;
        let summary = sim.tick();

        assert_eq!(summary.failures, 4);
        assert_eq!(sim.client().failed_publishes, 4);
        // every device still produced a value
        assert!(sim.registry().iter().all(|d| d.last_value().is_some()));
    }

    #[test]
    fn custom_topic_root() {
        let mut sim = sim(single("vehicle-1", DeviceKind::gps()), MockRandom::constant(0.5))
            .with_topics(Topics::new("lab"));
        sim.tick();
        assert_eq!(sim.client().published_to("lab/gps/vehicle-1").len(), 1);
    }

    // =========================================================================
    // Commands
    // =========================================================================

    #[test]
    fn turn_on_acks_and_republishes() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        let ack = sim.handle_command("smart-bulb-1", "TURN_ON").unwrap();
        assert_eq!(ack, Ack::BulbSet(BulbState::On));

        let acks = sim.client().published_to("iot/ack/smart-bulb-1");
        assert_eq!(acks[0].payload_str(), Some("ACK: Bulb set to ON"));

        let telemetry = sim.client().published_to("iot/bulb/smart-bulb-1");
        assert_eq!(telemetry.len(), 1);
        assert_eq!(telemetry[0].json().unwrap()["value"], "ON");
        // ack goes out before telemetry
        assert_eq!(sim.client().published[0].topic, "iot/ack/smart-bulb-1");
    }

    #[test]
    fn bulb_command_on_offline_bulb_acks_without_telemetry() {
        let registry = DeviceRegistry::from_devices([
            Device::new("smart-bulb-1", DeviceKind::bulb()).with_status(Status::Offline)
        ])
        .unwrap();
        let mut sim = sim(registry, MockRandom::constant(0.5));
        sim.handle_command("smart-bulb-1", "TURN_ON");

        assert_eq!(sim.client().published_to("iot/ack/smart-bulb-1").len(), 1);
        assert!(sim.client().published_to("iot/bulb/smart-bulb-1").is_empty());
        assert_eq!(
            sim.registry().get("smart-bulb-1").unwrap().bulb_state(),
            Some(BulbState::On)
        );
    }

    #[test]
    fn interval_change_is_recorded_once() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        sim.handle_command("vehicle-1", "SET_INTERVAL:1000");

        assert_eq!(sim.interval(), Duration::from_millis(1000));
        assert_eq!(sim.take_reschedule(), Some(Duration::from_millis(1000)));
        assert_eq!(sim.take_reschedule(), None);
    }

    #[test]
    fn rejected_interval_keeps_period() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        let ack = sim.handle_command("vehicle-1", "SET_INTERVAL:400").unwrap();
        assert_eq!(ack.to_string(), "NACK: Invalid interval");
        assert_eq!(sim.interval(), DEFAULT_PERIOD);
        assert_eq!(sim.take_reschedule(), None);
    }

    #[test]
    fn unknown_device_gets_no_ack() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        assert!(sim.handle_command("ghost-1", "TURN_ON").is_none());
        assert!(sim.handle_command("ghost-1", "SET_INTERVAL:1000").is_none());
        assert!(sim.client().published.is_empty());
        assert_eq!(sim.take_reschedule(), None);
    }

    #[test]
    fn ack_publish_failure_still_applies_command() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        sim.client_mut().fail_publishes = true;
        let ack = sim.handle_command("temp-sensor-1", "SET_THRESHOLD:31");
        assert!(ack.unwrap().is_ack());
        assert_eq!(sim.registry().get("temp-sensor-1").unwrap().threshold(), Some(31.0));
    }

    // =========================================================================
    // Inbound messages
    // =========================================================================

    #[test]
    fn poll_drains_queue_and_returns_last_interval() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        sim.client_mut().queue_message("iot/control/vehicle-1", "SET_INTERVAL:1000");
        sim.client_mut().queue_message("iot/control/smart-bulb-1", "TURN_ON");
        sim.client_mut().queue_message("iot/control/vehicle-1", "SET_INTERVAL:2000");

        assert_eq!(sim.poll(), Some(Duration::from_millis(2000)));
        assert!(sim.client().incoming.is_empty());
        assert_eq!(sim.client().published_under("iot/ack/").len(), 3);
        assert_eq!(sim.poll(), None);
    }

    #[test]
    fn malformed_messages_are_dropped() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        sim.client_mut().queue_message("iot/control/", "TURN_ON");
        sim.client_mut().queue_message("iot/status/smart-bulb-1", "TURN_ON");
        sim.client_mut().queue_message("iot/control/smart-bulb-1", vec![0xff, 0xfe]);

        assert_eq!(sim.poll(), None);
        assert!(sim.client().published.is_empty());
    }

    #[test]
    fn subscribes_control_filter() {
        let mut sim = sim(DeviceRegistry::demo_fleet(), MockRandom::constant(0.5));
        sim.subscribe_control_topics().unwrap();
        assert!(sim.client().is_subscribed("iot/control/#"));
    }
}
