//! Error types for the simulator.

use thiserror::Error;

/// Errors raised by the simulation engine and its transport.
///
/// None of these stop the simulation: the engine logs them and carries on
/// with the next device, command or tick.
#[derive(Debug, Error)]
pub enum SimError {
    /// The client refused to queue a message.
    #[error("publish to {topic} failed: {reason}")]
    Publish {
        /// Topic the message was addressed to.
        topic: String,
        /// Client-reported reason.
        reason: String,
    },

    /// A payload could not be encoded.
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Subscribing to the control topics failed.
    #[error("subscribe to {topic} failed: {reason}")]
    Subscribe {
        /// Topic filter.
        topic: String,
        /// Client-reported reason.
        reason: String,
    },

    /// Two devices share an id.
    #[error("duplicate device id: {0}")]
    DuplicateDevice(String),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// Path that was tried.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`](crate::config::Config).
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// A value is out of its allowed range.
    #[error("{0}")]
    Invalid(String),
}
