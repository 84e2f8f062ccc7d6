//! Simulated device records.
//!
//! A [`Device`] is one simulated unit in the fleet. Its [`DeviceKind`] is fixed
//! for its lifetime and carries the kind-specific state: only temperature
//! sensors have a threshold, only bulbs have an on/off state, only gps
//! trackers have a position.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Battery level a device starts with and recovers to.
pub const BATTERY_FULL: f64 = 100.0;

/// Default alert threshold for temperature sensors, in °C.
pub const DEFAULT_THRESHOLD: f64 = 28.0;

// ============================================================================
// Connectivity
// ============================================================================

/// Connectivity status of a device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Connected; produces telemetry every tick.
    #[default]
    Online,
    /// Disconnected; produces nothing until it recovers.
    Offline,
}

impl Status {
    /// Wire representation (`ONLINE` / `OFFLINE`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Online => "ONLINE",
            Status::Offline => "OFFLINE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commanded state of a smart bulb.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BulbState {
    /// Lit.
    On,
    /// Dark.
    #[default]
    Off,
}

impl BulbState {
    /// Wire representation (`ON` / `OFF`).
    pub fn as_str(&self) -> &'static str {
        match self {
            BulbState::On => "ON",
            BulbState::Off => "OFF",
        }
    }
}

impl fmt::Display for BulbState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl GeoPoint {
    /// Fixed origin the gps trackers move around.
    pub const ORIGIN: GeoPoint = GeoPoint { lat: 28.6, lng: 77.2 };

    /// Create a point.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

// ============================================================================
// Device Kind
// ============================================================================

/// The type of a device, with the state only that type carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeviceKind {
    /// Temperature sensor; alerts when a reading exceeds `threshold`.
    Temperature {
        /// Alert threshold in °C.
        threshold: f64,
    },
    /// Smart bulb; telemetry mirrors the commanded `state`.
    Bulb {
        /// Commanded on/off state.
        state: BulbState,
    },
    /// Heart-rate monitor.
    HeartRate,
    /// Vehicle gps tracker.
    Gps {
        /// Last reported position.
        position: GeoPoint,
    },
}

impl DeviceKind {
    /// Temperature sensor with the default threshold.
    pub fn temperature() -> Self {
        DeviceKind::Temperature {
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Bulb, initially off.
    pub fn bulb() -> Self {
        DeviceKind::Bulb {
            state: BulbState::Off,
        }
    }

    /// Gps tracker at the origin.
    pub fn gps() -> Self {
        DeviceKind::Gps {
            position: GeoPoint::ORIGIN,
        }
    }

    /// The type name used in topics and payloads.
    pub fn type_name(&self) -> &'static str {
        self.device_type().as_str()
    }

    /// The field-less type tag.
    pub fn device_type(&self) -> DeviceType {
        match self {
            DeviceKind::Temperature { .. } => DeviceType::Temperature,
            DeviceKind::Bulb { .. } => DeviceType::Bulb,
            DeviceKind::HeartRate => DeviceType::HeartRate,
            DeviceKind::Gps { .. } => DeviceType::Gps,
        }
    }

    /// Display unit, fixed per type.
    pub fn unit(&self) -> &'static str {
        self.device_type().unit()
    }
}

/// Device type without state, as named in config and on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    /// `temperature`
    Temperature,
    /// `bulb`
    Bulb,
    /// `heartRate`
    HeartRate,
    /// `gps`
    Gps,
}

impl DeviceType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Temperature => "temperature",
            DeviceType::Bulb => "bulb",
            DeviceType::HeartRate => "heartRate",
            DeviceType::Gps => "gps",
        }
    }

    /// Display unit.
    pub fn unit(&self) -> &'static str {
        match self {
            DeviceType::Temperature => "°C",
            DeviceType::Bulb => "state",
            DeviceType::HeartRate => "bpm",
            DeviceType::Gps => "lat,lng",
        }
    }

    /// Default kind-specific state for this type.
    pub fn default_kind(&self) -> DeviceKind {
        match self {
            DeviceType::Temperature => DeviceKind::temperature(),
            DeviceType::Bulb => DeviceKind::bulb(),
            DeviceType::HeartRate => DeviceKind::HeartRate,
            DeviceType::Gps => DeviceKind::gps(),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Telemetry Value
// ============================================================================

/// A published telemetry value.
///
/// Temperature and gps readings are pre-formatted strings, heart rate is a
/// raw integer and bulb state is the literal state string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    /// Raw integer value.
    Integer(u32),
    /// Pre-formatted value.
    Text(String),
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Integer(v) => write!(f, "{v}"),
            TelemetryValue::Text(s) => f.write_str(s),
        }
    }
}

// ============================================================================
// Device
// ============================================================================

/// One simulated device.
#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    id: String,
    kind: DeviceKind,
    status: Status,
    battery: f64,
    last_value: Option<TelemetryValue>,
}

impl Device {
    /// Create an online device with a full battery.
    pub fn new(id: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            status: Status::Online,
            battery: BATTERY_FULL,
            last_value: None,
        }
    }

    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind and kind-specific state.
    pub fn kind(&self) -> &DeviceKind {
        &self.kind
    }

    /// Type name (`temperature`, `bulb`, `heartRate`, `gps`).
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Display unit.
    pub fn unit(&self) -> &'static str {
        self.kind.unit()
    }

    /// Connectivity status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the device is online.
    pub fn is_online(&self) -> bool {
        self.status == Status::Online
    }

    /// Battery level in `[0, 100]`.
    pub fn battery(&self) -> f64 {
        self.battery
    }

    /// Last generated telemetry value, if any.
    pub fn last_value(&self) -> Option<&TelemetryValue> {
        self.last_value.as_ref()
    }

    /// Alert threshold; `None` for anything but temperature sensors.
    pub fn threshold(&self) -> Option<f64> {
        match self.kind {
            DeviceKind::Temperature { threshold } => Some(threshold),
            _ => None,
        }
    }

    /// Bulb state; `None` for anything but bulbs.
    pub fn bulb_state(&self) -> Option<BulbState> {
        match self.kind {
            DeviceKind::Bulb { state } => Some(state),
            _ => None,
        }
    }

    /// Gps position; `None` for anything but gps trackers.
    pub fn position(&self) -> Option<GeoPoint> {
        match self.kind {
            DeviceKind::Gps { position } => Some(position),
            _ => None,
        }
    }

    /// Start in the given status (used when building fleets from config).
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Start with the given battery level (clamped into range).
    pub fn with_battery(mut self, battery: f64) -> Self {
        self.set_battery(battery);
        self
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Battery writes are clamped; NaN is treated as empty.
    pub(crate) fn set_battery(&mut self, battery: f64) {
        self.battery = if battery.is_nan() {
            0.0
        } else {
            battery.clamp(0.0, BATTERY_FULL)
        };
    }

    pub(crate) fn set_last_value(&mut self, value: TelemetryValue) {
        self.last_value = Some(value);
    }

    /// Update the threshold. Returns `false` if this is not a temperature sensor.
    pub(crate) fn set_threshold(&mut self, value: f64) -> bool {
        match &mut self.kind {
            DeviceKind::Temperature { threshold } => {
                *threshold = value;
                true
            }
            _ => false,
        }
    }

    /// Update the bulb state. Returns `false` if this is not a bulb.
    pub(crate) fn set_bulb_state(&mut self, value: BulbState) -> bool {
        match &mut self.kind {
            DeviceKind::Bulb { state } => {
                *state = value;
                true
            }
            _ => false,
        }
    }

    /// Update the gps position. Returns `false` if this is not a gps tracker.
    pub(crate) fn set_position(&mut self, value: GeoPoint) -> bool {
        match &mut self.kind {
            DeviceKind::Gps { position } => {
                *position = value;
                true
            }
            _ => false,
        }
    }
}
