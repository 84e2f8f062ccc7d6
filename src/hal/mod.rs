//! Stand-in implementations of the collaborator traits.
//!
//! The traits in [`crate::traits`] have production implementations next to
//! them (`StdRandom`, `SystemClock`) and behind the `mqtt` feature
//! (`services::RumqttcClient`). This module holds the scripted versions the
//! tests and doc examples run against.
//!
//! # Available Implementations
//!
//! - `mock`: `MockMqtt`, `MockRandom`, `MockClock`

pub mod mock;

pub use mock::*;
