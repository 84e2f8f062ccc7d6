//! Command validation and application.
//!
//! [`CommandProcessor::apply`] checks a parsed [`Command`] against the target
//! device and mutates it through the registry. It does no I/O: it returns a
//! [`CommandOutcome`] telling the caller which ack to publish, whether to
//! reschedule the publish timer and whether to republish telemetry now.
//!
//! | Command | Applies to | Effect |
//! |---------|-----------|--------|
//! | `SET_INTERVAL:<n>` | any device, `n > min_interval_ms` | reschedule |
//! | `SET_THRESHOLD:<x>` | temperature | threshold = x |
//! | `TURN_ON` / `TURN_OFF` | bulb | state, republish |
//! | `RESET` | bulb | state OFF, republish |
//!
//! Commands addressed to an id the registry doesn't know produce no outcome
//! at all, so no ack is published.

use std::time::Duration;

use crate::commands::{Ack, Command, Nack};
use crate::device::DeviceType;
use crate::registry::DeviceRegistry;

/// Intervals must be strictly above this many milliseconds.
pub const MIN_INTERVAL_MS: u64 = 500;

/// What the caller must do after a command was applied.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandOutcome {
    /// Response to publish on the ack topic.
    pub ack: Ack,
    /// New publish period, if the command changed it.
    pub reschedule: Option<Duration>,
    /// Publish the device's telemetry immediately.
    pub republish: bool,
}

impl CommandOutcome {
    fn ack(ack: Ack) -> Self {
        Self {
            ack,
            reschedule: None,
            republish: false,
        }
    }

    fn nack(nack: Nack) -> Self {
        Self::ack(Ack::Rejected(nack))
    }
}

/// Applies control commands to devices in a registry.
#[derive(Clone, Copy, Debug)]
pub struct CommandProcessor {
    min_interval_ms: u64,
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self {
            min_interval_ms: MIN_INTERVAL_MS,
        }
    }
}

impl CommandProcessor {
    /// Create a processor with a custom interval floor (exclusive).
    pub fn new(min_interval_ms: u64) -> Self {
        Self { min_interval_ms }
    }

    /// Interval floor in milliseconds; accepted intervals are strictly above it.
    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Validate and apply `command` to the device `device_id`.
    ///
    /// Returns `None` when the device is unknown.
    pub fn apply(
        &self,
        registry: &mut DeviceRegistry,
        device_id: &str,
        command: &Command,
    ) -> Option<CommandOutcome> {
        let device = registry.get_mut(device_id)?;

        let device_type = device.kind().device_type();

        let outcome = match (command, device_type) {
            (Command::SetInterval(Some(ms)), _) if *ms > self.min_interval_ms => CommandOutcome {
                ack: Ack::IntervalUpdated(*ms),
                reschedule: Some(Duration::from_millis(*ms)),
                republish: false,
            },
            (Command::SetInterval(_), _) => CommandOutcome::nack(Nack::InvalidInterval),

            (Command::SetThreshold(Some(x)), DeviceType::Temperature) => {
                device.set_threshold(*x);
                CommandOutcome::ack(Ack::ThresholdUpdated {
                    threshold: *x,
                    unit: device.unit(),
                })
            }
            (Command::SetThreshold(None), DeviceType::Temperature) => {
                CommandOutcome::nack(Nack::InvalidThreshold)
            }

            (Command::TurnOn | Command::TurnOff | Command::Reset, DeviceType::Bulb) => {
                let state = command.bulb_state()?;
                device.set_bulb_state(state);
                let ack = match command {
                    Command::Reset => Ack::Reset,
                    _ => Ack::BulbSet(state),
                };
                CommandOutcome {
                    ack,
                    reschedule: None,
                    republish: true,
                }
            }

            _ => CommandOutcome::nack(Nack::NotSupported),
        };

        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_command;
    use crate::device::BulbState;

    fn apply(registry: &mut DeviceRegistry, id: &str, raw: &str) -> Option<CommandOutcome> {
        CommandProcessor::default().apply(registry, id, &parse_command(raw))
    }

    #[test]
    fn interval_accepted_above_minimum() {
        let mut registry = DeviceRegistry::demo_fleet();
        let outcome = apply(&mut registry, "vehicle-1", "SET_INTERVAL:1000").unwrap();
        assert_eq!(outcome.ack, Ack::IntervalUpdated(1000));
        assert_eq!(outcome.reschedule, Some(Duration::from_millis(1000)));
        assert!(!outcome.republish);
    }

    #[test]
    fn interval_rejected_at_or_below_minimum() {
        let mut registry = DeviceRegistry::demo_fleet();
        for raw in ["SET_INTERVAL:400", "SET_INTERVAL:500", "SET_INTERVAL:abc", "SET_INTERVAL"] {
            let outcome = apply(&mut registry, "vehicle-1", raw).unwrap();
            assert_eq!(outcome.ack, Ack::Rejected(Nack::InvalidInterval), "{raw}");
            assert!(outcome.reschedule.is_none());
        }
        let outcome = apply(&mut registry, "vehicle-1", "SET_INTERVAL:501").unwrap();
        assert!(outcome.ack.is_ack());
    }

    #[test]
    fn custom_minimum_interval() {
        let mut registry = DeviceRegistry::demo_fleet();
        let processor = CommandProcessor::new(2000);
        let outcome = processor
            .apply(&mut registry, "vehicle-1", &Command::SetInterval(Some(1000)))
            .unwrap();
        assert_eq!(outcome.ack, Ack::Rejected(Nack::InvalidInterval));
    }

    #[test]
    fn threshold_updates_temperature_sensor() {
        let mut registry = DeviceRegistry::demo_fleet();
        let outcome = apply(&mut registry, "temp-sensor-1", "SET_THRESHOLD:25.5").unwrap();
        assert_eq!(outcome.ack.to_string(), "ACK: Threshold updated to 25.5°C");
        assert_eq!(registry.get("temp-sensor-1").unwrap().threshold(), Some(25.5));
    }

    #[test]
    fn threshold_parse_failure_on_temperature() {
        let mut registry = DeviceRegistry::demo_fleet();
        let outcome = apply(&mut registry, "temp-sensor-1", "SET_THRESHOLD:warm").unwrap();
        assert_eq!(outcome.ack, Ack::Rejected(Nack::InvalidThreshold));
        assert_eq!(registry.get("temp-sensor-1").unwrap().threshold(), Some(28.0));
    }

    #[test]
    fn threshold_not_supported_elsewhere() {
        let mut registry = DeviceRegistry::demo_fleet();
        for id in ["smart-bulb-1", "heart-monitor-1", "vehicle-1"] {
            let outcome = apply(&mut registry, id, "SET_THRESHOLD:25.5").unwrap();
            assert_eq!(outcome.ack, Ack::Rejected(Nack::NotSupported), "{id}");
            let outcome = apply(&mut registry, id, "SET_THRESHOLD:junk").unwrap();
            assert_eq!(outcome.ack, Ack::Rejected(Nack::NotSupported), "{id}");
        }
    }

    #[test]
    fn bulb_commands() {
        let mut registry = DeviceRegistry::demo_fleet();

        let on = apply(&mut registry, "smart-bulb-1", "TURN_ON").unwrap();
        assert_eq!(on.ack.to_string(), "ACK: Bulb set to ON");
        assert!(on.republish);
        assert_eq!(registry.get("smart-bulb-1").unwrap().bulb_state(), Some(BulbState::On));

        let off = apply(&mut registry, "smart-bulb-1", "TURN_OFF").unwrap();
        assert_eq!(off.ack.to_string(), "ACK: Bulb set to OFF");
        assert_eq!(registry.get("smart-bulb-1").unwrap().bulb_state(), Some(BulbState::Off));

        apply(&mut registry, "smart-bulb-1", "TURN_ON").unwrap();
        let reset = apply(&mut registry, "smart-bulb-1", "RESET").unwrap();
        assert_eq!(reset.ack.to_string(), "ACK: Device reset to OFF");
        assert!(reset.republish);
        assert_eq!(registry.get("smart-bulb-1").unwrap().bulb_state(), Some(BulbState::Off));
    }

    #[test]
    fn bulb_commands_not_supported_elsewhere() {
        let mut registry = DeviceRegistry::demo_fleet();
        for raw in ["TURN_ON", "TURN_OFF", "RESET"] {
            let outcome = apply(&mut registry, "temp-sensor-1", raw).unwrap();
            assert_eq!(outcome.ack, Ack::Rejected(Nack::NotSupported), "{raw}");
            assert!(!outcome.republish);
        }
    }

    #[test]
    fn unknown_verb_not_supported() {
        let mut registry = DeviceRegistry::demo_fleet();
        let outcome = apply(&mut registry, "smart-bulb-1", "BLINK").unwrap();
        assert_eq!(outcome.ack, Ack::Rejected(Nack::NotSupported));
    }

    #[test]
    fn unknown_device_has_no_outcome() {
        let mut registry = DeviceRegistry::demo_fleet();
        assert!(apply(&mut registry, "ghost-1", "TURN_ON").is_none());
        assert!(apply(&mut registry, "ghost-1", "SET_INTERVAL:1000").is_none());
    }
}
