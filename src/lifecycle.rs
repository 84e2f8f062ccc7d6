//! Per-tick connectivity and battery lifecycle.
//!
//! Each tick a device runs through these rules in order, stopping at the
//! first transition so a device never goes offline and recovers in the same
//! tick:
//!
//! 1. Battery drains by `U(0, max_drain)` whatever the status.
//! 2. Online with battery below `low_battery` → offline.
//! 3. Online, with `disconnect_probability` → offline.
//! 4. Offline, with `recovery_probability` → online, battery reset to 100.
//!
//! ```rust
//! use iot_fleet_sim::device::{Device, DeviceKind, Status};
//! use iot_fleet_sim::hal::MockRandom;
//! use iot_fleet_sim::lifecycle::{DeviceStateMachine, Transition};
//!
//! let machine = DeviceStateMachine::default();
//! let mut device = Device::new("heart-monitor-1", DeviceKind::HeartRate).with_battery(10.5);
//!
//! // Drains 1.0 (0.5 * 2.0), leaving 9.5: below the low-battery mark.
//! let mut rng = MockRandom::new([0.5]);
//! let transition = machine.tick(&mut device, &mut rng);
//!
//! assert_eq!(transition, Some(Transition::LowBattery));
//! assert_eq!(device.status(), Status::Offline);
//! ```

use core::fmt;

use crate::device::{Device, Status, BATTERY_FULL};
use crate::traits::RandomSource;

/// A connectivity change taken during one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Went offline because the battery ran low.
    LowBattery,
    /// Went offline at random.
    Disconnected,
    /// Came back online with a fresh battery.
    Recovered,
}

impl Transition {
    /// Status the device is in after this transition.
    pub fn status(&self) -> Status {
        match self {
            Transition::LowBattery | Transition::Disconnected => Status::Offline,
            Transition::Recovered => Status::Online,
        }
    }

    /// Alert text announcing this transition for `device_id`.
    pub fn alert_text(&self, device_id: &str) -> String {
        match self {
            Transition::LowBattery => format!("ALERT: {device_id} went OFFLINE due to low battery"),
            Transition::Disconnected => format!("ALERT: {device_id} randomly disconnected"),
            Transition::Recovered => format!("INFO: {device_id} recovered and is ONLINE"),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::LowBattery => "low battery",
            Transition::Disconnected => "disconnected",
            Transition::Recovered => "recovered",
        };
        f.write_str(s)
    }
}

/// Tunables for the lifecycle rules.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceStateMachine {
    /// Upper bound of the per-tick battery drain.
    pub max_drain: f64,
    /// Online devices below this battery level go offline.
    pub low_battery: f64,
    /// Per-tick chance an online device disconnects.
    pub disconnect_probability: f64,
    /// Per-tick chance an offline device recovers.
    pub recovery_probability: f64,
}

impl Default for DeviceStateMachine {
    fn default() -> Self {
        Self {
            max_drain: 2.0,
            low_battery: 10.0,
            disconnect_probability: 0.05,
            recovery_probability: 0.05,
        }
    }
}

impl DeviceStateMachine {
    /// Advance `device` by one tick and report the transition taken, if any.
    pub fn tick<R: RandomSource + ?Sized>(&self, device: &mut Device, rng: &mut R) -> Option<Transition> {
        let drain = rng.uniform(0.0, self.max_drain);
        device.set_battery((device.battery() - drain).max(0.0));

        let transition = match device.status() {
            Status::Online if device.battery() < self.low_battery => Some(Transition::LowBattery),
            Status::Online if rng.chance(self.disconnect_probability) => {
                Some(Transition::Disconnected)
            }
            Status::Online => None,
            Status::Offline if rng.chance(self.recovery_probability) => Some(Transition::Recovered),
            Status::Offline => None,
        }?;

        device.set_status(transition.status());
        if transition == Transition::Recovered {
            device.set_battery(BATTERY_FULL);
        }
        Some(transition)
    }
}
