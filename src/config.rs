//! Device timing and threshold configuration.
//!
//! Every constant the state machines depend on lives here, with `Default`
//! carrying the firmware values. Tests and bench setups shorten the timings
//! through the `with_*` builders.
//!
//! Uses `heapless::String` for the access-point credentials so the
//! configuration stays `no_std` friendly.
//!
//! # Example
//!
//! ```rust
//! use bilateral_haptic::config::{ButtonTiming, DeviceConfig};
//!
//! // Firmware defaults
//! let config = DeviceConfig::default();
//! assert_eq!(config.controller.quantum_ms, 50);
//!
//! // Bench profile with a short hold-to-shutdown
//! let config = DeviceConfig::default()
//!     .with_button(ButtonTiming::default().with_countdown_ms(500));
//! assert_eq!(config.button.shutdown_hold_ms(), 2500);
//! ```

use heapless::String as HString;

/// Maximum length for SSIDs and passphrases.
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating on a char boundary.
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    for c in s.chars() {
        if hs.push(c).is_err() {
            break;
        }
    }
    hs
}

// ============================================================================
// Device Config
// ============================================================================

/// Complete device configuration.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Actuator Controller timing.
    pub controller: ControllerTiming,
    /// Input Handler timing.
    pub button: ButtonTiming,
    /// Power Guardian thresholds.
    pub battery: BatteryThresholds,
    /// Wireless Interface timing.
    pub wireless: WirelessTiming,
    /// Shutdown Orchestrator timing.
    pub shutdown: ShutdownTiming,
}

impl DeviceConfig {
    /// Set controller timing
    pub fn with_controller(mut self, controller: ControllerTiming) -> Self {
        self.controller = controller;
        self
    }

    /// Set button timing
    pub fn with_button(mut self, button: ButtonTiming) -> Self {
        self.button = button;
        self
    }

    /// Set battery thresholds
    pub fn with_battery(mut self, battery: BatteryThresholds) -> Self {
        self.battery = battery;
        self
    }

    /// Set wireless timing
    pub fn with_wireless(mut self, wireless: WirelessTiming) -> Self {
        self.wireless = wireless;
        self
    }

    /// Set shutdown timing
    pub fn with_shutdown(mut self, shutdown: ShutdownTiming) -> Self {
        self.shutdown = shutdown;
        self
    }
}

// ============================================================================
// Controller Timing
// ============================================================================

/// Actuator Controller timing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerTiming {
    /// Slice length of every interruptible wait.
    pub quantum_ms: u32,
    /// Indicator and back-EMF window after session start or a mode change.
    pub indication_window_ms: u32,
    /// How long before the end of drive the `drive` sample is taken.
    pub drive_sample_margin_ms: u32,
    /// Filter settle time between the `immediate` and `settled` samples.
    pub settle_ms: u32,
    /// Length of the end-of-session warning.
    pub last_minute_ms: u32,
}

impl Default for ControllerTiming {
    fn default() -> Self {
        Self {
            quantum_ms: 50,
            indication_window_ms: 10_000,
            drive_sample_margin_ms: 10,
            settle_ms: 10,
            last_minute_ms: 60_000,
        }
    }
}

impl ControllerTiming {
    /// Set the wait quantum (minimum 1 ms)
    pub fn with_quantum_ms(mut self, ms: u32) -> Self {
        self.quantum_ms = ms.max(1);
        self
    }

    /// Set the indication window
    pub fn with_indication_window_ms(mut self, ms: u32) -> Self {
        self.indication_window_ms = ms;
        self
    }

    /// Set the drive-sample margin
    pub fn with_drive_sample_margin_ms(mut self, ms: u32) -> Self {
        self.drive_sample_margin_ms = ms;
        self
    }

    /// Set the settle delay
    pub fn with_settle_ms(mut self, ms: u32) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set the last-minute warning length
    pub fn with_last_minute_ms(mut self, ms: u32) -> Self {
        self.last_minute_ms = ms;
        self
    }
}

// ============================================================================
// Button Timing
// ============================================================================

/// Input Handler timing.
///
/// ```text
///  0      50          1000        2000                 5000 ms
///  |debounce| short press | re-advertise | countdown ... | EmergencyShutdown
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ButtonTiming {
    /// Polling interval.
    pub sample_ms: u32,
    /// Minimum stable press before it is accepted.
    pub debounce_ms: u32,
    /// Presses at least this long re-enable advertising instead of cycling mode.
    pub advertise_hold_ms: u32,
    /// Holding this long starts the shutdown countdown.
    pub hold_ms: u32,
    /// Countdown length; release during it cancels.
    pub countdown_ms: u32,
}

impl Default for ButtonTiming {
    fn default() -> Self {
        Self {
            sample_ms: 10,
            debounce_ms: 50,
            advertise_hold_ms: 1000,
            hold_ms: 2000,
            countdown_ms: 3000,
        }
    }
}

impl ButtonTiming {
    /// Set the polling interval (minimum 1 ms)
    pub fn with_sample_ms(mut self, ms: u32) -> Self {
        self.sample_ms = ms.max(1);
        self
    }

    /// Set the debounce time
    pub fn with_debounce_ms(mut self, ms: u32) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the advertising re-enable threshold
    pub fn with_advertise_hold_ms(mut self, ms: u32) -> Self {
        self.advertise_hold_ms = ms;
        self
    }

    /// Set the hold threshold
    pub fn with_hold_ms(mut self, ms: u32) -> Self {
        self.hold_ms = ms;
        self
    }

    /// Set the countdown length
    pub fn with_countdown_ms(mut self, ms: u32) -> Self {
        self.countdown_ms = ms;
        self
    }

    /// Total hold time that ends in a shutdown.
    pub fn shutdown_hold_ms(&self) -> u32 {
        self.hold_ms + self.countdown_ms
    }
}

// ============================================================================
// Battery Thresholds
// ============================================================================

/// Power Guardian thresholds for a single LiPo cell.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatteryThresholds {
    /// Voltage reported as 100 %.
    pub full_v: f32,
    /// Voltage reported as 0 %.
    pub empty_v: f32,
    /// Upper edge of the warning band (inclusive).
    pub warning_v: f32,
    /// Low-voltage cutoff (inclusive: at or below shuts down).
    pub cutoff_v: f32,
    /// Below the cutoff, flash a warning only at or above this voltage.
    pub flash_floor_v: f32,
    /// Below this there is no cell (bench supply); operation is allowed.
    pub no_battery_v: f32,
    /// Runtime sampling period.
    pub sample_period_ms: u32,
}

impl Default for BatteryThresholds {
    fn default() -> Self {
        Self {
            full_v: 4.2,
            empty_v: 3.0,
            warning_v: 3.4,
            cutoff_v: 3.2,
            flash_floor_v: 3.0,
            no_battery_v: 0.5,
            sample_period_ms: 10_000,
        }
    }
}

impl BatteryThresholds {
    /// Set the cutoff voltage
    pub fn with_cutoff_v(mut self, v: f32) -> Self {
        self.cutoff_v = v;
        self
    }

    /// Set the warning band edge
    pub fn with_warning_v(mut self, v: f32) -> Self {
        self.warning_v = v;
        self
    }

    /// Set the sampling period
    pub fn with_sample_period_ms(mut self, ms: u32) -> Self {
        self.sample_period_ms = ms;
        self
    }

    /// Linear state of charge between `empty_v` and `full_v`, clamped.
    ///
    /// ```
    /// use bilateral_haptic::config::BatteryThresholds;
    ///
    /// let t = BatteryThresholds::default();
    /// assert_eq!(t.percent(4.2), 100);
    /// assert_eq!(t.percent(3.6), 50);
    /// assert_eq!(t.percent(2.5), 0);
    /// ```
    pub fn percent(&self, voltage: f32) -> u8 {
        let span = self.full_v - self.empty_v;
        if span <= 0.0 {
            return 0;
        }
        let pct = (voltage - self.empty_v) / span * 100.0;
        // round to nearest, then clamp
        (pct + 0.5).clamp(0.0, 100.0) as u8
    }
}

// ============================================================================
// Wireless Timing
// ============================================================================

/// Wireless Interface timing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WirelessTiming {
    /// Advertising window before returning to idle.
    pub advertising_timeout_ms: u32,
    /// Poll period while idle.
    pub idle_poll_ms: u32,
    /// Poll period while advertising or connected.
    pub active_poll_ms: u32,
    /// Advertise immediately at boot.
    pub advertise_on_boot: bool,
}

impl Default for WirelessTiming {
    fn default() -> Self {
        Self {
            advertising_timeout_ms: 300_000,
            idle_poll_ms: 1000,
            active_poll_ms: 100,
            advertise_on_boot: true,
        }
    }
}

impl WirelessTiming {
    /// Set the advertising timeout
    pub fn with_advertising_timeout_ms(mut self, ms: u32) -> Self {
        self.advertising_timeout_ms = ms;
        self
    }

    /// Set both poll periods
    pub fn with_poll_ms(mut self, idle_ms: u32, active_ms: u32) -> Self {
        self.idle_poll_ms = idle_ms.max(1);
        self.active_poll_ms = active_ms.max(1);
        self
    }

    /// Set whether advertising starts at boot
    pub fn with_advertise_on_boot(mut self, enabled: bool) -> Self {
        self.advertise_on_boot = enabled;
        self
    }
}

// ============================================================================
// Shutdown Timing
// ============================================================================

/// Shutdown Orchestrator timing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShutdownTiming {
    /// Blink half-period of the waiting-for-release pattern.
    pub release_blink_ms: u32,
    /// On/off time of each low-battery warning flash.
    pub warning_flash_ms: u32,
    /// Number of low-battery warning flashes.
    pub warning_flashes: u8,
}

impl Default for ShutdownTiming {
    fn default() -> Self {
        Self {
            release_blink_ms: 100,
            warning_flash_ms: 200,
            warning_flashes: 3,
        }
    }
}

impl ShutdownTiming {
    /// Set the release blink half-period
    pub fn with_release_blink_ms(mut self, ms: u32) -> Self {
        self.release_blink_ms = ms.max(1);
        self
    }

    /// Set the warning flash pattern
    pub fn with_warning_flashes(mut self, count: u8, ms: u32) -> Self {
        self.warning_flashes = count;
        self.warning_flash_ms = ms;
        self
    }
}

// ============================================================================
// Access Point Config
// ============================================================================

/// SoftAP credentials for the configuration surface.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessPointConfig {
    /// Network name
    pub ssid: ShortString,
    /// WPA2 passphrase (empty = open network)
    pub password: ShortString,
    /// Radio channel
    pub channel: u8,
    /// HTTP port of the register surface
    pub port: u16,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: short_string("bilateral-haptic"),
            password: ShortString::new(),
            channel: 6,
            port: 80,
        }
    }
}

impl AccessPointConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the passphrase
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Set the radio channel
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Check if the network is protected
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}
