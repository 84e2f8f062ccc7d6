//! Synthetic telemetry generation.
//!
//! [`TelemetryGenerator::generate`] maps a device and a random source to a
//! [`Reading`]. It never mutates the device; the simulator decides what to do
//! with the reading (publish it, store the last value, move a gps tracker).
//!
//! | Type | Reading |
//! |------|---------|
//! | temperature | uniform in `[20, 35)`, two decimals |
//! | heartRate | integer in `[60, 100)` |
//! | gps | `origin ± 0.01°` per axis, five decimals |
//! | bulb | the commanded state |

use serde::{Deserialize, Serialize};

use crate::device::{BulbState, Device, DeviceKind, GeoPoint, TelemetryValue};
use crate::traits::RandomSource;

/// Lowest generated temperature, °C.
pub const TEMPERATURE_MIN: f64 = 20.0;
/// Width of the generated temperature range, °C.
pub const TEMPERATURE_SPAN: f64 = 15.0;
/// Lowest generated heart rate, bpm.
pub const HEART_RATE_MIN: u32 = 60;
/// Width of the generated heart-rate range, bpm.
pub const HEART_RATE_SPAN: u32 = 40;
/// Maximum gps offset per axis, degrees.
pub const GPS_JITTER: f64 = 0.01;

/// How gps trackers move between ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsMode {
    /// Independent sample near [`GeoPoint::ORIGIN`] every tick.
    #[default]
    Jitter,
    /// Step from the device's last position (persistent random walk).
    Walk,
}

/// A single generated sensor reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reading {
    /// Temperature in °C, already rounded to two decimals.
    Temperature(f64),
    /// Heart rate in bpm.
    HeartRate(u32),
    /// Vehicle position.
    Position(GeoPoint),
    /// Bulb state.
    Bulb(BulbState),
}

impl Reading {
    /// Payload representation of this reading.
    pub fn to_value(&self) -> TelemetryValue {
        match self {
            Reading::Temperature(t) => TelemetryValue::Text(format!("{t:.2}")),
            Reading::HeartRate(bpm) => TelemetryValue::Integer(*bpm),
            Reading::Position(p) => TelemetryValue::Text(p.to_string()),
            Reading::Bulb(state) => TelemetryValue::Text(state.as_str().to_string()),
        }
    }

    /// Numeric temperature, if this is a temperature reading.
    pub fn temperature(&self) -> Option<f64> {
        match self {
            Reading::Temperature(t) => Some(*t),
            _ => None,
        }
    }
}

/// Generates readings for online devices.
#[derive(Clone, Copy, Debug, Default)]
pub struct TelemetryGenerator {
    gps_mode: GpsMode,
}

impl TelemetryGenerator {
    /// Create a generator with the given gps behaviour.
    pub fn new(gps_mode: GpsMode) -> Self {
        Self { gps_mode }
    }

    /// Configured gps behaviour.
    pub fn gps_mode(&self) -> GpsMode {
        self.gps_mode
    }

    /// Produce a reading, or `None` if the device is offline.
    pub fn generate<R: RandomSource + ?Sized>(&self, device: &Device, rng: &mut R) -> Option<Reading> {
        if !device.is_online() {
            return None;
        }

        let reading = match device.kind() {
            DeviceKind::Temperature { .. } => {
                let raw = rng.uniform(TEMPERATURE_MIN, TEMPERATURE_MIN + TEMPERATURE_SPAN);
                Reading::Temperature(round_to_hundredths(raw))
            }
            DeviceKind::HeartRate => {
                let offset = (rng.next_unit() * HEART_RATE_SPAN as f64).floor() as u32;
                Reading::HeartRate(HEART_RATE_MIN + offset.min(HEART_RATE_SPAN - 1))
            }
            DeviceKind::Gps { position } => {
                let from = match self.gps_mode {
                    GpsMode::Jitter => GeoPoint::ORIGIN,
                    GpsMode::Walk => *position,
                };
                let lat = from.lat + rng.uniform(-GPS_JITTER, GPS_JITTER);
                let lng = from.lng + rng.uniform(-GPS_JITTER, GPS_JITTER);
                Reading::Position(GeoPoint::new(lat, lng))
            }
            DeviceKind::Bulb { state } => Reading::Bulb(*state),
        };

        Some(reading)
    }
}

/// Round the same way the payload is formatted, so the threshold check
/// compares against exactly what subscribers see.
fn round_to_hundredths(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}
