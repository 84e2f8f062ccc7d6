//! Wire formats: topics, JSON payloads and alerts.
//!
//! # Example
//!
//! ```
//! use iot_fleet_sim::messages::{Severity, Topics};
//!
//! let topics = Topics::default();
//! assert_eq!(topics.telemetry("gps", "vehicle-1"), "iot/gps/vehicle-1");
//! assert_eq!(topics.device_from_control("iot/control/vehicle-1"), Some("vehicle-1"));
//!
//! assert_eq!(Severity::of("ALERT: vehicle-1 randomly disconnected"), Severity::Error);
//! assert_eq!(Severity::of("INFO: vehicle-1 recovered and is ONLINE"), Severity::Info);
//! ```

use serde::{Deserialize, Serialize};

use crate::device::{Device, Status, TelemetryValue};

// ============================================================================
// Topics
// ============================================================================

/// Topic builder rooted at a configurable prefix (default `iot`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topics {
    root: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self::new("iot")
    }
}

impl Topics {
    /// Create a builder for the given root.
    pub fn new(root: impl Into<String>) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    /// Topic root.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// `<root>/status/<id>`
    pub fn status(&self, device_id: &str) -> String {
        format!("{}/status/{}", self.root, device_id)
    }

    /// `<root>/<type>/<id>`
    pub fn telemetry(&self, device_type: &str, device_id: &str) -> String {
        format!("{}/{}/{}", self.root, device_type, device_id)
    }

    /// `<root>/alert/<id>`
    pub fn alert(&self, device_id: &str) -> String {
        format!("{}/alert/{}", self.root, device_id)
    }

    /// `<root>/control/<id>`
    pub fn control(&self, device_id: &str) -> String {
        format!("{}/control/{}", self.root, device_id)
    }

    /// `<root>/ack/<id>`
    pub fn ack(&self, device_id: &str) -> String {
        format!("{}/ack/{}", self.root, device_id)
    }

    /// Wildcard filter covering every control topic.
    pub fn control_filter(&self) -> String {
        format!("{}/control/#", self.root)
    }

    /// Extract the device id from a control topic.
    ///
    /// Returns `None` if the topic is not `<root>/control/<id>` with a single,
    /// non-empty id segment.
    pub fn device_from_control<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let id = topic
            .strip_prefix(self.root.as_str())?
            .strip_prefix("/control/")?;
        if id.is_empty() || id.contains('/') {
            None
        } else {
            Some(id)
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Published on `<root>/status/<id>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    /// Device id.
    pub device_id: String,
    /// Connectivity status.
    pub status: Status,
    /// Battery level.
    pub battery: f64,
    /// ISO-8601 timestamp.
    pub timestamp: String,
}

impl StatusPayload {
    /// Snapshot a device.
    pub fn from_device(device: &Device, timestamp: String) -> Self {
        Self {
            device_id: device.id().to_string(),
            status: device.status(),
            battery: device.battery(),
            timestamp,
        }
    }
}

/// Published on `<root>/<type>/<id>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPayload {
    /// Device id.
    pub device_id: String,
    /// Device type name.
    #[serde(rename = "type")]
    pub device_type: String,
    /// The reading.
    pub value: TelemetryValue,
    /// Display unit.
    pub unit: String,
    /// Battery level.
    pub battery: f64,
    /// Connectivity status.
    pub status: Status,
    /// ISO-8601 timestamp.
    pub timestamp: String,
}

impl TelemetryPayload {
    /// Build a payload for `device` carrying `value`.
    pub fn from_device(device: &Device, value: TelemetryValue, timestamp: String) -> Self {
        Self {
            device_id: device.id().to_string(),
            device_type: device.type_name().to_string(),
            value,
            unit: device.unit().to_string(),
            battery: device.battery(),
            status: device.status(),
            timestamp,
        }
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// How a subscriber should present an alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Text starts with `ALERT`.
    Error,
    /// Text starts with `INFO`.
    Info,
    /// Anything else.
    Warning,
}

impl Severity {
    /// Classify alert text by its prefix.
    pub fn of(text: &str) -> Self {
        if text.starts_with("ALERT") {
            Severity::Error
        } else if text.starts_with("INFO") {
            Severity::Info
        } else {
            Severity::Warning
        }
    }
}

/// A one-shot alert, published as plain text on `<root>/alert/<id>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    /// Device the alert is about.
    pub device_id: String,
    /// Alert text, including its `ALERT:` / `INFO:` prefix.
    pub text: String,
    /// Severity derived from the text.
    pub severity: Severity,
}

impl Alert {
    /// Create an alert; severity follows from the text.
    pub fn new(device_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            device_id: device_id.into(),
            severity: Severity::of(&text),
            text,
        }
    }

    /// `ALERT: <id> exceeded threshold (<value><unit> > <threshold><unit>)`
    pub fn threshold_exceeded(device: &Device, value: &TelemetryValue, threshold: f64) -> Self {
        let unit = device.unit();
        let text = format!(
            "ALERT: {} exceeded threshold ({value}{unit} > {threshold}{unit})",
            device.id()
        );
        Self::new(device.id(), text)
    }
}
