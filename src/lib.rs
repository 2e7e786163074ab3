//! # bilateral-haptic
//!
//! Control core for a battery-powered bilateral haptic stimulation device:
//! a handheld unit that alternates a vibration actuator between forward and
//! reverse drive for the length of a therapy session.
//!
//! ## Features
//!
//! - **Alternation engine**: four catalog modes plus a tunable custom profile
//! - **Back-EMF characterization**: three-phase sampling around each drive edge
//! - **Single-button control**: short press cycles modes, long hold shuts down
//! - **Power safety**: boot voltage check, runtime low-battery monitoring
//! - **Wireless tuning**: a validated register table behind any transport
//! - **Safe shutdown**: actuator neutral, config saved only when dirty, button wake
//!
//! ## Architecture
//!
//! Each component is an independent task that owns its hardware and talks to
//! the others only through [`ControlMessage`]s:
//!
//! - `actuator` - the Actuator Controller state machine
//! - `input` - the Input Handler button state machine
//! - `power` - the Power Guardian
//! - `wireless` - the Wireless Interface and register table
//! - `shutdown` - the Shutdown Orchestrator
//! - `store` - persisted configuration records
//! - `runtime` - thread wiring on `std` targets
//! - `hal` - concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::{mpsc, Arc};
//! use bilateral_haptic::actuator::{ActuatorController, DriveOutputs, Peers};
//! use bilateral_haptic::hal::{MockActuator, MockBackEmf, MockClock, MockIndicator, ScriptedInbox};
//! use bilateral_haptic::status::StatusBoard;
//! use bilateral_haptic::{ControlMessage, ModeId, ShutdownReason, CATALOG};
//!
//! let clock = MockClock::new();
//! let actuator = MockActuator::new(clock.clone());
//! let observer = actuator.clone();
//!
//! // Switch to the slow catalog mode after 3 s, stop after 10 s
//! let inbox = ScriptedInbox::new(clock.clone())
//!     .with_message(3_000, ControlMessage::ModeChanged(CATALOG[2]))
//!     .with_message(10_000, ControlMessage::EmergencyShutdown);
//!
//! let (to_input, _) = mpsc::channel::<ControlMessage>();
//! let (to_wireless, _) = mpsc::channel::<ControlMessage>();
//! let status = Arc::new(StatusBoard::default());
//! let peers = Peers::new(to_input, to_wireless, status.clone());
//!
//! let outputs = DriveOutputs::new(actuator, MockIndicator::new(clock.clone()));
//! let handoff = ActuatorController::new(outputs, MockBackEmf::new(0), inbox, peers, clock).run();
//!
//! assert_eq!(handoff.reason, ShutdownReason::Emergency);
//! assert_eq!(status.active_mode(), ModeId::HalfHzHalf);
//! assert!(observer.is_neutral());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// The Actuator Controller: bilateral alternation and back-EMF sampling.
pub mod actuator;
/// Back-EMF sample records and conversion.
pub mod backemf;
/// Device timing and threshold configuration.
pub mod config;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// The Input Handler: button debouncing and gesture classification.
pub mod input;
/// Inter-task messages and channel traits.
pub mod messages;
/// Alternation profiles.
pub mod mode;
/// The Power Guardian: boot check and battery monitoring.
pub mod power;
/// Inbox coalescing with shutdown precedence.
pub mod priority;
/// The Shutdown Orchestrator.
pub mod shutdown;
/// Status shared between tasks.
pub mod status;
/// Persisted configuration records.
pub mod store;
/// Core traits for hardware and wireless abstraction.
pub mod traits;
/// The Wireless Interface and its register table.
pub mod wireless;

/// Thread wiring for `std` targets.
#[cfg(feature = "std")]
pub mod runtime;

// Re-exports for convenience
pub use actuator::{ActuatorController, ControllerState, DriveOutputs, Handoff};
pub use config::DeviceConfig;
pub use input::{ButtonState, InputHandler};
pub use messages::{ControlMessage, Inbox, LiveTuning, Outbox, PALETTE};
pub use mode::{CustomProfile, Mode, ModeId, CATALOG};
pub use power::PowerGuardian;
pub use priority::{PendingMessages, ShutdownReason};
pub use shutdown::ShutdownOrchestrator;
pub use traits::{
    // Hardware
    ActuatorDriver,
    BackEmfSensor,
    ButtonInput,
    Clock,
    Delay,
    Direction,
    Indicator,
    Rgb,
    SleepControl,
    VoltageSensor,
    // Wireless
    WirelessTransport,
};
pub use wireless::WirelessInterface;
