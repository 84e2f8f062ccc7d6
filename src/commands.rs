//! Control command grammar and acknowledgments.
//!
//! Commands arrive as plain text on `iot/control/<deviceId>` with the grammar
//! `VERB[:PARAM]`. [`parse_command`] turns the raw string into a [`Command`]
//! once; everything downstream matches on the variant.
//!
//! # Command Flow
//!
//! 1. Raw payload is parsed into a [`Command`] (never fails; garbage becomes
//!    [`Command::Unknown`], a bad parameter becomes `None`)
//! 2. The [`CommandProcessor`](crate::processor::CommandProcessor) validates it
//!    against the target device
//! 3. The result is an [`Ack`], published to `iot/ack/<deviceId>`
//!
//! ```rust
//! use iot_fleet_sim::commands::{parse_command, Command};
//!
//! assert_eq!(parse_command("SET_INTERVAL:1000"), Command::SetInterval(Some(1000)));
//! assert_eq!(parse_command("SET_INTERVAL:soon"), Command::SetInterval(None));
//! assert_eq!(parse_command("TURN_ON"), Command::TurnOn);
//! assert_eq!(parse_command("DANCE"), Command::Unknown("DANCE".into()));
//! ```

use core::fmt;

use thiserror::Error;

use crate::device::BulbState;

// ============================================================================
// Command
// ============================================================================

/// A parsed control command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `SET_INTERVAL:<n>`; `None` if `n` is not an integer.
    SetInterval(Option<u64>),
    /// `SET_THRESHOLD:<x>`; `None` if `x` is not a finite number.
    SetThreshold(Option<f64>),
    /// `TURN_ON`
    TurnOn,
    /// `TURN_OFF`
    TurnOff,
    /// `RESET`
    Reset,
    /// Anything else, kept verbatim for logging.
    Unknown(String),
}

impl Command {
    /// The verb as it appears on the wire.
    pub fn verb(&self) -> &str {
        match self {
            Command::SetInterval(_) => "SET_INTERVAL",
            Command::SetThreshold(_) => "SET_THRESHOLD",
            Command::TurnOn => "TURN_ON",
            Command::TurnOff => "TURN_OFF",
            Command::Reset => "RESET",
            Command::Unknown(raw) => raw.as_str(),
        }
    }

    /// Bulb state this command sets, for the bulb verbs.
    pub fn bulb_state(&self) -> Option<BulbState> {
        match self {
            Command::TurnOn => Some(BulbState::On),
            Command::TurnOff | Command::Reset => Some(BulbState::Off),
            _ => None,
        }
    }
}

/// Parse a raw control payload.
///
/// Surrounding whitespace is ignored and verbs are case-sensitive. Verbs that
/// take no parameter are unknown if one is given.
pub fn parse_command(raw: &str) -> Command {
    let raw = raw.trim();
    let (verb, param) = match raw.split_once(':') {
        Some((verb, param)) => (verb, Some(param.trim())),
        None => (raw, None),
    };

    match (verb, param) {
        ("SET_INTERVAL", Some(p)) => Command::SetInterval(p.parse::<u64>().ok()),
        ("SET_INTERVAL", None) => Command::SetInterval(None),
        ("SET_THRESHOLD", Some(p)) => {
            Command::SetThreshold(p.parse::<f64>().ok().filter(|x| x.is_finite()))
        }
        ("SET_THRESHOLD", None) => Command::SetThreshold(None),
        ("TURN_ON", None) => Command::TurnOn,
        ("TURN_OFF", None) => Command::TurnOff,
        ("RESET", None) => Command::Reset,
        _ => Command::Unknown(raw.to_string()),
    }
}

// ============================================================================
// Acknowledgments
// ============================================================================

/// Reason a command was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Nack {
    /// Interval missing, unparseable or not above the minimum.
    #[error("Invalid interval")]
    InvalidInterval,
    /// Threshold unparseable.
    #[error("Invalid threshold")]
    InvalidThreshold,
    /// The verb does not apply to this device type, or is unknown.
    #[error("Command not supported for this device")]
    NotSupported,
}

/// Response published to `iot/ack/<deviceId>`.
#[derive(Clone, Debug, PartialEq)]
pub enum Ack {
    /// Publish interval changed (milliseconds).
    IntervalUpdated(u64),
    /// Temperature threshold changed.
    ThresholdUpdated {
        /// New threshold.
        threshold: f64,
        /// Unit of the threshold.
        unit: &'static str,
    },
    /// Bulb switched on or off.
    BulbSet(BulbState),
    /// Bulb reset to off.
    Reset,
    /// Command refused.
    Rejected(Nack),
}

impl Ack {
    /// Whether the command was accepted.
    pub fn is_ack(&self) -> bool {
        !matches!(self, Ack::Rejected(_))
    }
}

impl From<Nack> for Ack {
    fn from(nack: Nack) -> Self {
        Ack::Rejected(nack)
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ack::IntervalUpdated(ms) => write!(f, "ACK: Interval updated to {ms}ms"),
            Ack::ThresholdUpdated { threshold, unit } => {
                write!(f, "ACK: Threshold updated to {threshold}{unit}")
            }
            Ack::BulbSet(state) => write!(f, "ACK: Bulb set to {state}"),
            Ack::Reset => f.write_str("ACK: Device reset to OFF"),
            Ack::Rejected(nack) => write!(f, "NACK: {nack}"),
        }
    }
}
