//! Alternation profiles: the fixed catalog plus the tunable custom profile.
//!
//! A [`Mode`] describes one half-cycle of the bilateral pattern: drive the
//! actuator for `active_ms`, then let it coast for `coast_ms`. A full cycle
//! runs one forward half-cycle followed by one reverse half-cycle.
//!
//! # Catalog
//!
//! | Id | Name | Active | Coast | Intensity bound |
//! |----|------|--------|-------|-----------------|
//! | 0 | `1Hz@50%` | 250 ms | 250 ms | 50..=80 % |
//! | 1 | `1Hz@25%` | 125 ms | 375 ms | 50..=80 % |
//! | 2 | `0.5Hz@50%` | 500 ms | 500 ms | 70..=90 % |
//! | 3 | `0.5Hz@25%` | 250 ms | 750 ms | 70..=90 % |
//! | 4 | `Custom` | derived | derived | 30..=80 % |
//!
//! The custom profile is defined by a frequency in centihertz and a duty
//! cycle, and maps to half-cycle timings:
//!
//! ```rust
//! use bilateral_haptic::{CustomProfile, ModeId};
//!
//! let profile = CustomProfile::new(100, 50, 75).unwrap(); // 1.00 Hz, 50 %
//! let mode = profile.to_mode();
//! assert_eq!(mode.id, ModeId::Custom);
//! assert_eq!(mode.active_ms, 250);
//! assert_eq!(mode.coast_ms, 250);
//! ```

use core::fmt;
use core::ops::RangeInclusive;

/// Identifier of a mode; also its register value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ModeId {
    /// 1 Hz, 50 % duty.
    #[default]
    OneHzHalf = 0,
    /// 1 Hz, 25 % duty.
    OneHzQuarter = 1,
    /// 0.5 Hz, 50 % duty.
    HalfHzHalf = 2,
    /// 0.5 Hz, 25 % duty.
    HalfHzQuarter = 3,
    /// User-tunable profile.
    Custom = 4,
}

impl ModeId {
    /// All mode ids in short-press cycle order.
    pub const ALL: [ModeId; 5] = [
        ModeId::OneHzHalf,
        ModeId::OneHzQuarter,
        ModeId::HalfHzHalf,
        ModeId::HalfHzQuarter,
        ModeId::Custom,
    ];

    /// Parses a register value.
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(ModeId::OneHzHalf),
            1 => Some(ModeId::OneHzQuarter),
            2 => Some(ModeId::HalfHzHalf),
            3 => Some(ModeId::HalfHzQuarter),
            4 => Some(ModeId::Custom),
            _ => None,
        }
    }

    /// Register value of this id.
    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Next mode for a short press: 0 → 1 → 2 → 3 → custom → 0.
    ///
    /// ```
    /// use bilateral_haptic::ModeId;
    ///
    /// assert_eq!(ModeId::HalfHzQuarter.next(), ModeId::Custom);
    /// assert_eq!(ModeId::Custom.next(), ModeId::OneHzHalf);
    /// ```
    pub const fn next(self) -> Self {
        match self {
            ModeId::OneHzHalf => ModeId::OneHzQuarter,
            ModeId::OneHzQuarter => ModeId::HalfHzHalf,
            ModeId::HalfHzHalf => ModeId::HalfHzQuarter,
            ModeId::HalfHzQuarter => ModeId::Custom,
            ModeId::Custom => ModeId::OneHzHalf,
        }
    }

    /// Safety bound on drive intensity for this profile.
    pub const fn intensity_bounds(self) -> RangeInclusive<u8> {
        match self {
            ModeId::OneHzHalf | ModeId::OneHzQuarter => 50..=80,
            ModeId::HalfHzHalf | ModeId::HalfHzQuarter => 70..=90,
            ModeId::Custom => CUSTOM_INTENSITY_MIN..=CUSTOM_INTENSITY_MAX,
        }
    }

    /// Catalog profile for this id, `None` for custom.
    pub fn preset(self) -> Option<Mode> {
        CATALOG.iter().copied().find(|m| m.id == self)
    }
}

/// Drive intensity used by every catalog profile.
pub const CATALOG_INTENSITY: u8 = 75;

/// Lowest custom frequency in centihertz (0.5 Hz).
pub const CUSTOM_FREQUENCY_MIN: u16 = 50;
/// Highest custom frequency in centihertz (2.0 Hz).
pub const CUSTOM_FREQUENCY_MAX: u16 = 200;
/// Lowest custom duty cycle in percent.
pub const CUSTOM_DUTY_MIN: u8 = 10;
/// Highest custom duty cycle in percent.
pub const CUSTOM_DUTY_MAX: u8 = 90;
/// Lowest custom drive intensity in percent.
pub const CUSTOM_INTENSITY_MIN: u8 = 30;
/// Highest custom drive intensity in percent.
pub const CUSTOM_INTENSITY_MAX: u8 = 80;

/// The four preset profiles.
pub const CATALOG: [Mode; 4] = [
    Mode::preset(ModeId::OneHzHalf, "1Hz@50%", 250, 250),
    Mode::preset(ModeId::OneHzQuarter, "1Hz@25%", 125, 375),
    Mode::preset(ModeId::HalfHzHalf, "0.5Hz@50%", 500, 500),
    Mode::preset(ModeId::HalfHzQuarter, "0.5Hz@25%", 250, 750),
];

/// A named alternation profile.
///
/// Modes are immutable values and travel inside
/// [`ControlMessage::ModeChanged`](crate::ControlMessage::ModeChanged).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mode {
    /// Profile identifier.
    pub id: ModeId,
    /// Display name.
    pub name: &'static str,
    /// Drive time per half-cycle in milliseconds.
    pub active_ms: u32,
    /// Coast time per half-cycle in milliseconds.
    pub coast_ms: u32,
    /// Drive intensity (PWM duty) in percent.
    pub intensity_percent: u8,
}

impl Mode {
    const fn preset(id: ModeId, name: &'static str, active_ms: u32, coast_ms: u32) -> Self {
        Self {
            id,
            name,
            active_ms,
            coast_ms,
            intensity_percent: CATALOG_INTENSITY,
        }
    }

    /// Duration of one half-cycle.
    #[inline]
    pub const fn half_cycle_ms(&self) -> u32 {
        self.active_ms + self.coast_ms
    }

    /// Returns `true` for the custom profile.
    #[inline]
    pub fn is_custom(&self) -> bool {
        self.id == ModeId::Custom
    }

    /// Checks the profile invariants.
    pub fn validate(&self) -> Result<(), ModeError> {
        if self.active_ms == 0 || self.coast_ms == 0 {
            return Err(ModeError::ZeroPhase);
        }
        if !self.id.intensity_bounds().contains(&self.intensity_percent) {
            return Err(ModeError::IntensityOutOfBounds {
                id: self.id,
                intensity_percent: self.intensity_percent,
            });
        }
        if self.is_custom() {
            // full cycle = 2 half-cycles, 0.5..=2.0 Hz
            let cycle = self.half_cycle_ms() * 2;
            if !(500..=2000).contains(&cycle) {
                return Err(ModeError::FrequencyOutOfBounds);
            }
        }
        Ok(())
    }
}

impl Default for Mode {
    fn default() -> Self {
        CATALOG[0]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}ms on / {}ms coast @ {}%)",
            self.name, self.active_ms, self.coast_ms, self.intensity_percent
        )
    }
}

/// Profile invariant violations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeError {
    /// Active or coast duration is zero.
    ZeroPhase,
    /// Intensity outside the profile's safety bound.
    IntensityOutOfBounds {
        /// Profile that was checked.
        id: ModeId,
        /// Offending intensity.
        intensity_percent: u8,
    },
    /// Custom frequency outside 0.5-2.0 Hz.
    FrequencyOutOfBounds,
    /// Custom duty cycle outside its bound.
    DutyOutOfBounds,
}

impl fmt::Display for ModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeError::ZeroPhase => write!(f, "active and coast durations must be non-zero"),
            ModeError::IntensityOutOfBounds {
                id,
                intensity_percent,
            } => write!(f, "intensity {intensity_percent}% out of bounds for {id:?}"),
            ModeError::FrequencyOutOfBounds => write!(f, "frequency out of 0.5-2.0 Hz"),
            ModeError::DutyOutOfBounds => write!(f, "duty cycle out of bounds"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ModeError {}

// ============================================================================
// Custom Profile
// ============================================================================

/// Tunable fields of the custom profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomProfile {
    frequency_chz: u16,
    duty_percent: u8,
    intensity_percent: u8,
}

impl CustomProfile {
    /// Creates a profile, checking every field against its bound.
    pub fn new(frequency_chz: u16, duty_percent: u8, intensity_percent: u8) -> Result<Self, ModeError> {
        if !(CUSTOM_FREQUENCY_MIN..=CUSTOM_FREQUENCY_MAX).contains(&frequency_chz) {
            return Err(ModeError::FrequencyOutOfBounds);
        }
        if !(CUSTOM_DUTY_MIN..=CUSTOM_DUTY_MAX).contains(&duty_percent) {
            return Err(ModeError::DutyOutOfBounds);
        }
        if !ModeId::Custom.intensity_bounds().contains(&intensity_percent) {
            return Err(ModeError::IntensityOutOfBounds {
                id: ModeId::Custom,
                intensity_percent,
            });
        }
        Ok(Self {
            frequency_chz,
            duty_percent,
            intensity_percent,
        })
    }

    /// Frequency in centihertz.
    #[inline]
    pub fn frequency_chz(&self) -> u16 {
        self.frequency_chz
    }

    /// Duty cycle in percent of each half-cycle.
    #[inline]
    pub fn duty_percent(&self) -> u8 {
        self.duty_percent
    }

    /// Drive intensity in percent.
    #[inline]
    pub fn intensity_percent(&self) -> u8 {
        self.intensity_percent
    }

    /// Returns a copy with a new frequency.
    pub fn with_frequency_chz(self, frequency_chz: u16) -> Result<Self, ModeError> {
        Self::new(frequency_chz, self.duty_percent, self.intensity_percent)
    }

    /// Returns a copy with a new duty cycle.
    pub fn with_duty_percent(self, duty_percent: u8) -> Result<Self, ModeError> {
        Self::new(self.frequency_chz, duty_percent, self.intensity_percent)
    }

    /// Returns a copy with a new intensity.
    pub fn with_intensity_percent(self, intensity_percent: u8) -> Result<Self, ModeError> {
        Self::new(self.frequency_chz, self.duty_percent, intensity_percent)
    }

    /// Half-cycle timings for this profile.
    ///
    /// `half = 50_000 / freq_chz`, `active = half * duty / 100`,
    /// `coast = half - active`.
    pub fn to_mode(&self) -> Mode {
        let half = 50_000 / u32::from(self.frequency_chz);
        let active = half * u32::from(self.duty_percent) / 100;
        Mode {
            id: ModeId::Custom,
            name: "Custom",
            active_ms: active,
            coast_ms: half - active,
            intensity_percent: self.intensity_percent,
        }
    }
}

impl Default for CustomProfile {
    fn default() -> Self {
        Self {
            frequency_chz: 100,
            duty_percent: 50,
            intensity_percent: CATALOG_INTENSITY,
        }
    }
}

/// Resolves a mode id to a concrete profile.
pub fn resolve(id: ModeId, custom: &CustomProfile) -> Mode {
    id.preset().unwrap_or_else(|| custom.to_mode())
}
