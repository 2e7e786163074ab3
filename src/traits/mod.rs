//! Trait definitions for hardware and wireless abstraction.
//!
//! These traits let the control core run on different hardware (ESP32,
//! desktop mock) without changing the state machines.
//!
//! # Submodules
//!
//! - `hardware`: Actuator, indicator, sensors, button, sleep, clock, delay
//! - `network`: Register transport for the wireless configuration surface

pub mod hardware;
pub mod network;

pub use hardware::*;
pub use network::*;
