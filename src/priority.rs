//! Inbox coalescing with shutdown precedence.
//!
//! The controller folds every received message into a [`PendingMessages`]
//! accumulator and takes a [`Drained`] summary on entry to
//! `AwaitingInstruction`.
//!
//! # Rules
//!
//! | Class | Rule |
//! |-------|------|
//! | [`MessageClass::Shutdown`] | First shutdown cause is kept and always wins |
//! | [`MessageClass::ModeChange`] | Last `ModeChanged` wins |
//! | [`MessageClass::Tuning`] | Last `ConfigChanged` wins |
//! | [`MessageClass::Advisory`] | Last `BatteryWarning` is reported |
//! | [`MessageClass::Foreign`] | Not addressed to the controller; counted and dropped |
//!
//! Coalescing only ever collapses messages of the same class, so a shutdown
//! can never be hidden behind a later mode change.
//!
//! ```rust
//! use bilateral_haptic::{ControlMessage, PendingMessages, ShutdownReason, CATALOG};
//!
//! let mut pending = PendingMessages::new();
//! pending.absorb(ControlMessage::ModeChanged(CATALOG[1]));
//! pending.absorb(ControlMessage::EmergencyShutdown);
//! pending.absorb(ControlMessage::ModeChanged(CATALOG[2]));
//!
//! let drained = pending.take();
//! assert_eq!(drained.shutdown, Some(ShutdownReason::Emergency));
//! assert_eq!(drained.mode, Some(CATALOG[2]));
//! ```

use crate::messages::{ControlMessage, LiveTuning};
use crate::mode::Mode;

/// Priority class of a message, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageClass {
    /// Addressed to another task.
    Foreign = 0,
    /// Informational (battery warning).
    Advisory = 1,
    /// Live-tuning refresh.
    Tuning = 2,
    /// Mode switch.
    ModeChange = 3,
    /// Ends the session.
    Shutdown = 4,
}

impl ControlMessage {
    /// Priority class of this message, as seen by the controller.
    pub fn class(&self) -> MessageClass {
        match self {
            ControlMessage::EmergencyShutdown | ControlMessage::BatteryCritical { .. } => {
                MessageClass::Shutdown
            }
            ControlMessage::ModeChanged(_) => MessageClass::ModeChange,
            ControlMessage::ConfigChanged(_) => MessageClass::Tuning,
            ControlMessage::BatteryWarning { .. } => MessageClass::Advisory,
            ControlMessage::SessionTimedOut | ControlMessage::ReenableAdvertising => {
                MessageClass::Foreign
            }
        }
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShutdownReason {
    /// Hold-to-shutdown from the button.
    Emergency,
    /// Battery at or below the cutoff.
    BatteryCritical {
        /// Measured voltage.
        voltage: f32,
        /// State of charge.
        percent: u8,
    },
    /// Configured session duration reached.
    SessionTimeout,
}

/// A battery reading carried by a warning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatteryNotice {
    /// Measured voltage.
    pub voltage: f32,
    /// State of charge.
    pub percent: u8,
}

/// Result of draining the inbox.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Drained {
    /// Shutdown cause, if any shutdown-class message arrived.
    pub shutdown: Option<ShutdownReason>,
    /// Most recent mode request.
    pub mode: Option<Mode>,
    /// Most recent tuning snapshot.
    pub tuning: Option<LiveTuning>,
    /// Most recent battery warning.
    pub warning: Option<BatteryNotice>,
    /// Mode requests superseded by a later one.
    pub coalesced_modes: u16,
    /// Messages addressed to another task.
    pub foreign: u16,
}

impl Drained {
    /// Returns `true` when nothing arrived.
    pub fn is_empty(&self) -> bool {
        self.shutdown.is_none()
            && self.mode.is_none()
            && self.tuning.is_none()
            && self.warning.is_none()
            && self.foreign == 0
    }
}

/// Accumulator for messages received between drains.
#[derive(Clone, Copy, Debug, Default)]
pub struct PendingMessages {
    inner: Drained,
}

impl PendingMessages {
    /// Creates an empty accumulator.
    pub const fn new() -> Self {
        Self {
            inner: Drained {
                shutdown: None,
                mode: None,
                tuning: None,
                warning: None,
                coalesced_modes: 0,
                foreign: 0,
            },
        }
    }

    /// Folds one message in. Returns its class.
    pub fn absorb(&mut self, msg: ControlMessage) -> MessageClass {
        let class = msg.class();
        let inner = &mut self.inner;
        match msg {
            ControlMessage::EmergencyShutdown => {
                inner.shutdown.get_or_insert(ShutdownReason::Emergency);
            }
            ControlMessage::BatteryCritical { voltage, percent } => {
                inner
                    .shutdown
                    .get_or_insert(ShutdownReason::BatteryCritical { voltage, percent });
            }
            ControlMessage::ModeChanged(mode) => {
                if inner.mode.replace(mode).is_some() {
                    inner.coalesced_modes = inner.coalesced_modes.saturating_add(1);
                }
            }
            ControlMessage::ConfigChanged(tuning) => inner.tuning = Some(tuning),
            ControlMessage::BatteryWarning { voltage, percent } => {
                inner.warning = Some(BatteryNotice { voltage, percent });
            }
            ControlMessage::SessionTimedOut | ControlMessage::ReenableAdvertising => {
                inner.foreign = inner.foreign.saturating_add(1);
            }
        }
        class
    }

    /// Returns `true` if a shutdown cause is pending.
    #[inline]
    pub fn has_shutdown(&self) -> bool {
        self.inner.shutdown.is_some()
    }

    /// Takes the summary and resets the accumulator.
    pub fn take(&mut self) -> Drained {
        core::mem::take(&mut self.inner)
    }
}
