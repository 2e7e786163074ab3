//! Inter-task message types and the channel traits that carry them.
//!
//! Every task owns its state; tasks coordinate only by sending immutable
//! [`ControlMessage`] values. The Actuator Controller consumes its
//! [`Inbox`]; producers hold an [`Outbox`] to it.
//!
//! # Message Flow
//!
//! | Message | Producer | Consumer |
//! |---------|----------|----------|
//! | `ModeChanged` | Input Handler, Wireless | Controller |
//! | `EmergencyShutdown` | Input Handler, Controller | Controller, Wireless, Input |
//! | `BatteryWarning` / `BatteryCritical` | Power Guardian | Controller |
//! | `SessionTimedOut` | Controller | Input Handler |
//! | `ConfigChanged` | Wireless | Controller |
//! | `ReenableAdvertising` | Input Handler | Wireless |
//!
//! On `std`, `mpsc::Receiver` implements [`Inbox`] and `mpsc::Sender`
//! implements [`Outbox`]:
//!
//! ```rust
//! use std::sync::mpsc;
//! use bilateral_haptic::{ControlMessage, Inbox, Outbox};
//!
//! let (tx, mut rx) = mpsc::channel();
//! tx.post(ControlMessage::EmergencyShutdown).unwrap();
//! assert_eq!(rx.try_recv_message(), Some(ControlMessage::EmergencyShutdown));
//! assert_eq!(rx.try_recv_message(), None);
//! ```

use crate::mode::{CustomProfile, Mode};
use crate::traits::Rgb;
use core::fmt;

// ============================================================================
// Control Messages
// ============================================================================

/// A message between tasks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlMessage {
    /// Switch to a new alternation profile.
    ///
    /// A custom-mode payload is resolved against the controller's latest
    /// [`LiveTuning`], so its timing fields are advisory.
    ModeChanged(Mode),
    /// Stop driving and shut down. Final once sent.
    EmergencyShutdown,
    /// Battery is low but operation may continue.
    BatteryWarning {
        /// Measured voltage.
        voltage: f32,
        /// State of charge.
        percent: u8,
    },
    /// Battery is at or below the cutoff; shut down.
    BatteryCritical {
        /// Measured voltage.
        voltage: f32,
        /// State of charge.
        percent: u8,
    },
    /// The controller ended the session on timeout.
    SessionTimedOut,
    /// Live-tunable fields changed; carries the new snapshot.
    ConfigChanged(LiveTuning),
    /// The user asked for the radio to advertise again.
    ReenableAdvertising,
}

impl ControlMessage {
    /// Returns `true` for messages that end the session.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            ControlMessage::EmergencyShutdown | ControlMessage::BatteryCritical { .. }
        )
    }
}

// ============================================================================
// Live Tuning
// ============================================================================

/// The 16-colour indicator palette.
pub const PALETTE: [Rgb; 16] = [
    Rgb::new(255, 0, 0),     // Red
    Rgb::new(0, 255, 0),     // Green
    Rgb::new(0, 0, 255),     // Blue
    Rgb::new(255, 255, 0),   // Yellow
    Rgb::new(0, 255, 255),   // Cyan
    Rgb::new(255, 0, 255),   // Magenta
    Rgb::new(255, 128, 0),   // Orange
    Rgb::new(128, 0, 255),   // Purple
    Rgb::new(0, 255, 128),   // Spring green
    Rgb::new(255, 192, 203), // Pink
    Rgb::new(255, 255, 255), // White
    Rgb::new(128, 128, 0),   // Olive
    Rgb::new(0, 128, 128),   // Teal
    Rgb::new(128, 0, 128),   // Violet
    Rgb::new(64, 224, 208),  // Turquoise
    Rgb::new(255, 140, 0),   // Dark orange
];

/// Where the indicator colour comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSource {
    /// An entry of [`PALETTE`].
    Palette(u8),
    /// A free RGB value.
    Custom(Rgb),
}

/// Presentation settings for the indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndicatorSettings {
    /// Show the indicator for the whole custom-mode session.
    pub enabled: bool,
    /// Colour selection.
    pub color: ColorSource,
    /// Brightness in percent.
    pub brightness_percent: u8,
}

impl IndicatorSettings {
    /// Resolved colour, before brightness scaling.
    pub fn rgb(&self) -> Rgb {
        match self.color {
            ColorSource::Palette(index) => PALETTE[usize::from(index) % PALETTE.len()],
            ColorSource::Custom(rgb) => rgb,
        }
    }
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            color: ColorSource::Custom(Rgb::new(255, 0, 0)),
            brightness_percent: 20,
        }
    }
}

/// Snapshot of every field the controller re-reads on `ConfigChanged`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveTuning {
    /// Custom profile timing and intensity.
    pub custom: CustomProfile,
    /// Indicator presentation.
    pub indicator: IndicatorSettings,
    /// Session length in seconds.
    pub session_duration_s: u32,
}

impl Default for LiveTuning {
    fn default() -> Self {
        Self {
            custom: CustomProfile::default(),
            indicator: IndicatorSettings::default(),
            session_duration_s: 1200,
        }
    }
}

// ============================================================================
// Channels
// ============================================================================

/// The receiving task is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Disconnected;

impl fmt::Display for Disconnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiving task has exited")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Disconnected {}

/// Receiving end of a task's message queue.
///
/// Both methods are bounded: `recv_timeout` waits at most `timeout_ms`
/// even when every sender has gone away.
pub trait Inbox {
    /// Takes the next queued message without waiting.
    fn try_recv_message(&mut self) -> Option<ControlMessage>;

    /// Waits up to `timeout_ms` for the next message.
    fn recv_timeout_ms(&mut self, timeout_ms: u32) -> Option<ControlMessage>;
}

/// Sending end of another task's message queue.
pub trait Outbox {
    /// Queues `msg` for the receiving task.
    fn post(&self, msg: ControlMessage) -> Result<(), Disconnected>;
}

#[cfg(feature = "std")]
impl Inbox for std::sync::mpsc::Receiver<ControlMessage> {
    fn try_recv_message(&mut self) -> Option<ControlMessage> {
        self.try_recv().ok()
    }

    fn recv_timeout_ms(&mut self, timeout_ms: u32) -> Option<ControlMessage> {
        use std::sync::mpsc::RecvTimeoutError;
        use std::time::Duration;

        let timeout = Duration::from_millis(u64::from(timeout_ms));
        match self.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // keep the caller's cadence
                std::thread::sleep(timeout);
                None
            }
        }
    }
}

#[cfg(feature = "std")]
impl Outbox for std::sync::mpsc::Sender<ControlMessage> {
    fn post(&self, msg: ControlMessage) -> Result<(), Disconnected> {
        self.send(msg).map_err(|_| Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn shutdown_class() {
        assert!(ControlMessage::EmergencyShutdown.is_shutdown());
        assert!(ControlMessage::BatteryCritical {
            voltage: 3.1,
            percent: 8
        }
        .is_shutdown());
        assert!(!ControlMessage::BatteryWarning {
            voltage: 3.3,
            percent: 25
        }
        .is_shutdown());
        assert!(!ControlMessage::SessionTimedOut.is_shutdown());
        assert!(!ControlMessage::ModeChanged(Mode::default()).is_shutdown());
    }

    #[test]
    fn palette_color_resolution() {
        let settings = IndicatorSettings {
            enabled: true,
            color: ColorSource::Palette(7),
            brightness_percent: 10,
        };
        assert_eq!(settings.rgb(), Rgb::new(128, 0, 255));

        let settings = IndicatorSettings {
            color: ColorSource::Custom(Rgb::new(1, 2, 3)),
            ..settings
        };
        assert_eq!(settings.rgb(), Rgb::new(1, 2, 3));
    }

    #[test]
    fn receiver_preserves_order() {
        let (tx, mut rx) = mpsc::channel();
        tx.post(ControlMessage::ReenableAdvertising).unwrap();
        tx.post(ControlMessage::EmergencyShutdown).unwrap();

        assert_eq!(
            rx.recv_timeout_ms(10),
            Some(ControlMessage::ReenableAdvertising)
        );
        assert_eq!(rx.try_recv_message(), Some(ControlMessage::EmergencyShutdown));
        assert_eq!(rx.recv_timeout_ms(1), None);
    }

    #[test]
    fn post_to_dropped_receiver_fails() {
        let (tx, rx) = mpsc::channel::<ControlMessage>();
        drop(rx);
        assert_eq!(tx.post(ControlMessage::SessionTimedOut), Err(Disconnected));
    }

    #[test]
    fn disconnected_inbox_still_waits() {
        let (tx, mut rx) = mpsc::channel::<ControlMessage>();
        drop(tx);
        let start = std::time::Instant::now();
        assert_eq!(rx.recv_timeout_ms(20), None);
        assert!(start.elapsed() >= std::time::Duration::from_millis(20));
    }
}
