//! Lock-free status shared between tasks.
//!
//! Each field has exactly one writer. Readers tolerate a value that is one
//! polling period stale, so plain `Relaxed` loads and stores are enough and no
//! task ever blocks on another.
//!
//! | Field | Writer | Readers |
//! |-------|--------|---------|
//! | `StatusBoard::active_mode` | Actuator Controller | Input Handler, Wireless |
//! | `StatusBoard::session_elapsed_s` | Actuator Controller | Wireless |
//! | `StatusBoard::battery_percent` | Power Guardian | Wireless |
//! | `LinkStatus::connected` | Radio stack callback | Wireless |
//! | `LinkStatus::advertising` | Wireless | Diagnostics |

use crate::mode::ModeId;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Published session state.
#[derive(Debug)]
pub struct StatusBoard {
    active_mode: AtomicU8,
    session_elapsed_s: AtomicU32,
    battery_percent: AtomicU8,
}

impl StatusBoard {
    /// Creates a board showing `mode` active, no elapsed time, unknown battery.
    pub const fn new(mode: ModeId) -> Self {
        Self {
            active_mode: AtomicU8::new(mode as u8),
            session_elapsed_s: AtomicU32::new(0),
            battery_percent: AtomicU8::new(0),
        }
    }

    /// Mode the controller is currently running.
    pub fn active_mode(&self) -> ModeId {
        ModeId::from_index(self.active_mode.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Publishes the running mode.
    pub fn set_active_mode(&self, mode: ModeId) {
        self.active_mode.store(mode.index(), Ordering::Relaxed);
    }

    /// Seconds since the session started.
    pub fn session_elapsed_s(&self) -> u32 {
        self.session_elapsed_s.load(Ordering::Relaxed)
    }

    /// Publishes the session time.
    pub fn set_session_elapsed_s(&self, secs: u32) {
        self.session_elapsed_s.store(secs, Ordering::Relaxed);
    }

    /// Last measured state of charge.
    pub fn battery_percent(&self) -> u8 {
        self.battery_percent.load(Ordering::Relaxed)
    }

    /// Publishes the state of charge.
    pub fn set_battery_percent(&self, percent: u8) {
        self.battery_percent.store(percent.min(100), Ordering::Relaxed);
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(ModeId::default())
    }
}

/// Radio link flags.
///
/// `connected` is written from the radio stack's event callback, outside any
/// task. The Wireless Interface polls it once per period.
#[derive(Debug, Default)]
pub struct LinkStatus {
    connected: AtomicBool,
    advertising: AtomicBool,
}

impl LinkStatus {
    /// Creates a disconnected, non-advertising link.
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            advertising: AtomicBool::new(false),
        }
    }

    /// Returns `true` while a client is connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Called by the radio stack on connect / disconnect.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Returns `true` while the device is discoverable.
    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::Relaxed)
    }

    /// Updated by the Wireless Interface.
    pub fn set_advertising(&self, advertising: bool) {
        self.advertising.store(advertising, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_round_trips_mode_and_clamps_percent() {
        let board = StatusBoard::default();
        assert_eq!(board.active_mode(), ModeId::OneHzHalf);
        board.set_active_mode(ModeId::Custom);
        assert_eq!(board.active_mode(), ModeId::Custom);

        board.set_battery_percent(140);
        assert_eq!(board.battery_percent(), 100);
    }

    #[test]
    fn link_flags_are_independent() {
        let link = LinkStatus::new();
        link.set_advertising(true);
        assert!(!link.is_connected());
        link.set_connected(true);
        link.set_advertising(false);
        assert!(link.is_connected());
        assert!(!link.is_advertising());
    }
}
