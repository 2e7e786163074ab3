//! The register table behind the wireless configuration surface.
//!
//! | Field | Type | Range | Default | Persisted |
//! |-------|------|-------|---------|-----------|
//! | `mode` | u8 | 0..=4 | 0 | no |
//! | `custom_frequency` | u16 | 50..=200 cHz | 100 | yes |
//! | `custom_duty` | u8 | 10..=90 % | 50 | yes |
//! | `custom_intensity` | u8 | 30..=80 % | 75 | yes |
//! | `led_enable` | bool | any | true | yes |
//! | `led_color_mode` | u8 | 0..=1 | 1 | yes |
//! | `led_palette_index` | u8 | 0..=15 | 0 | yes |
//! | `led_rgb` | rgb | any | 255,0,0 | yes |
//! | `led_brightness` | u8 | 10..=30 % | 20 | yes |
//! | `session_duration` | u32 | 1200..=5400 s | 1200 | yes |
//! | `session_time` | u32 | read-only | | no |
//! | `battery_level` | u8 | read-only | | no |
//!
//! A rejected write leaves every stored value unchanged and does not touch
//! the dirty flag.

use crate::messages::{ColorSource, IndicatorSettings, LiveTuning};
use crate::mode::{CustomProfile, ModeId};
use crate::status::StatusBoard;
use crate::store::{ConfigStore, PersistedConfig, SCHEMA_SIGNATURE};
use crate::traits::Rgb;
use core::fmt;
use core::ops::RangeInclusive;

/// Lowest accepted indicator brightness.
pub const BRIGHTNESS_MIN: u8 = 10;
/// Highest accepted indicator brightness.
pub const BRIGHTNESS_MAX: u8 = 30;
/// Shortest accepted session in seconds.
pub const SESSION_MIN_S: u32 = 1200;
/// Longest accepted session in seconds.
pub const SESSION_MAX_S: u32 = 5400;

/// A named register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Active mode.
    Mode,
    /// Custom frequency in centihertz.
    CustomFrequency,
    /// Custom duty cycle.
    CustomDuty,
    /// Custom drive intensity.
    CustomIntensity,
    /// Indicator enable for custom mode.
    LedEnable,
    /// Palette or custom RGB.
    LedColorMode,
    /// Palette entry.
    LedPalette,
    /// Custom RGB colour.
    LedRgb,
    /// Indicator brightness.
    LedBrightness,
    /// Session length.
    SessionDuration,
    /// Elapsed session time (read-only).
    SessionTime,
    /// Battery state of charge (read-only).
    BatteryLevel,
}

/// Value type of a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// One byte.
    U8,
    /// Two bytes.
    U16,
    /// Four bytes.
    U32,
    /// Boolean.
    Bool,
    /// Three bytes.
    Rgb,
}

/// A register value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterValue {
    /// One byte.
    U8(u8),
    /// Two bytes.
    U16(u16),
    /// Four bytes.
    U32(u32),
    /// Boolean.
    Bool(bool),
    /// Colour.
    Rgb(Rgb),
}

impl RegisterValue {
    /// Kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            RegisterValue::U8(_) => ValueKind::U8,
            RegisterValue::U16(_) => ValueKind::U16,
            RegisterValue::U32(_) => ValueKind::U32,
            RegisterValue::Bool(_) => ValueKind::Bool,
            RegisterValue::Rgb(_) => ValueKind::Rgb,
        }
    }

    /// Builds a value of `kind` from an unsigned scalar, if it fits.
    ///
    /// Transports with untyped numeric payloads use this before writing.
    ///
    /// ```
    /// use bilateral_haptic::wireless::{RegisterValue, ValueKind};
    ///
    /// assert_eq!(RegisterValue::from_scalar(ValueKind::U8, 42), Some(RegisterValue::U8(42)));
    /// assert_eq!(RegisterValue::from_scalar(ValueKind::U8, 300), None);
    /// assert_eq!(RegisterValue::from_scalar(ValueKind::Bool, 1), Some(RegisterValue::Bool(true)));
    /// ```
    pub fn from_scalar(kind: ValueKind, raw: u32) -> Option<Self> {
        match kind {
            ValueKind::U8 => u8::try_from(raw).ok().map(RegisterValue::U8),
            ValueKind::U16 => u16::try_from(raw).ok().map(RegisterValue::U16),
            ValueKind::U32 => Some(RegisterValue::U32(raw)),
            ValueKind::Bool => match raw {
                0 => Some(RegisterValue::Bool(false)),
                1 => Some(RegisterValue::Bool(true)),
                _ => None,
            },
            ValueKind::Rgb => None,
        }
    }

    /// Scalar form of the value; colours pack as `0xRRGGBB`.
    pub fn as_scalar(&self) -> u32 {
        match *self {
            RegisterValue::U8(v) => u32::from(v),
            RegisterValue::U16(v) => u32::from(v),
            RegisterValue::U32(v) => v,
            RegisterValue::Bool(v) => u32::from(v),
            RegisterValue::Rgb(c) => (u32::from(c.r) << 16) | (u32::from(c.g) << 8) | u32::from(c.b),
        }
    }
}

/// Why a write was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterError {
    /// The field cannot be written.
    ReadOnly,
    /// The value has the wrong type for the field.
    TypeMismatch,
    /// The value is outside the field's range.
    OutOfRange,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::ReadOnly => write!(f, "register is read-only"),
            RegisterError::TypeMismatch => write!(f, "wrong value type for register"),
            RegisterError::OutOfRange => write!(f, "value out of range"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegisterError {}

impl Field {
    /// Every register, in table order.
    pub const ALL: [Field; 12] = [
        Field::Mode,
        Field::CustomFrequency,
        Field::CustomDuty,
        Field::CustomIntensity,
        Field::LedEnable,
        Field::LedColorMode,
        Field::LedPalette,
        Field::LedRgb,
        Field::LedBrightness,
        Field::SessionDuration,
        Field::SessionTime,
        Field::BatteryLevel,
    ];

    /// Register name.
    pub const fn name(self) -> &'static str {
        match self {
            Field::Mode => "mode",
            Field::CustomFrequency => "custom_frequency",
            Field::CustomDuty => "custom_duty",
            Field::CustomIntensity => "custom_intensity",
            Field::LedEnable => "led_enable",
            Field::LedColorMode => "led_color_mode",
            Field::LedPalette => "led_palette_index",
            Field::LedRgb => "led_rgb",
            Field::LedBrightness => "led_brightness",
            Field::SessionDuration => "session_duration",
            Field::SessionTime => "session_time",
            Field::BatteryLevel => "battery_level",
        }
    }

    /// Looks a register up by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Value type.
    pub const fn kind(self) -> ValueKind {
        match self {
            Field::CustomFrequency => ValueKind::U16,
            Field::SessionDuration | Field::SessionTime => ValueKind::U32,
            Field::LedEnable => ValueKind::Bool,
            Field::LedRgb => ValueKind::Rgb,
            _ => ValueKind::U8,
        }
    }

    /// Returns `true` for fields a client may write.
    pub const fn is_writable(self) -> bool {
        !matches!(self, Field::SessionTime | Field::BatteryLevel)
    }

    /// Accepted range of a numeric field, `None` when every value is valid.
    pub fn range(self) -> Option<RangeInclusive<u32>> {
        let range = match self {
            Field::Mode => 0..=u32::from(ModeId::Custom.index()),
            Field::CustomFrequency => {
                u32::from(crate::mode::CUSTOM_FREQUENCY_MIN)..=u32::from(crate::mode::CUSTOM_FREQUENCY_MAX)
            }
            Field::CustomDuty => {
                u32::from(crate::mode::CUSTOM_DUTY_MIN)..=u32::from(crate::mode::CUSTOM_DUTY_MAX)
            }
            Field::CustomIntensity => {
                u32::from(crate::mode::CUSTOM_INTENSITY_MIN)..=u32::from(crate::mode::CUSTOM_INTENSITY_MAX)
            }
            Field::LedColorMode => 0..=1,
            Field::LedPalette => 0..=15,
            Field::LedBrightness => u32::from(BRIGHTNESS_MIN)..=u32::from(BRIGHTNESS_MAX),
            Field::SessionDuration => SESSION_MIN_S..=SESSION_MAX_S,
            Field::LedEnable | Field::LedRgb | Field::SessionTime | Field::BatteryLevel => {
                return None
            }
        };
        Some(range)
    }

    /// Checks a candidate value without storing it.
    pub fn validate(self, value: RegisterValue) -> Result<(), RegisterError> {
        if !self.is_writable() {
            return Err(RegisterError::ReadOnly);
        }
        if value.kind() != self.kind() {
            return Err(RegisterError::TypeMismatch);
        }
        match self.range() {
            Some(range) if !range.contains(&value.as_scalar()) => Err(RegisterError::OutOfRange),
            _ => Ok(()),
        }
    }
}

/// Side effect an accepted write asks the interface to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteEffect {
    /// Switch the controller to this mode.
    SwitchMode(ModeId),
    /// A custom-mode tuning field changed.
    Tuning,
    /// A device-wide field changed (applies in every mode).
    Device,
}

/// Register values plus the dirty flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigRegisters {
    mode: ModeId,
    custom: CustomProfile,
    led_enable: bool,
    led_color_mode: u8,
    led_palette: u8,
    led_rgb: Rgb,
    led_brightness: u8,
    session_duration_s: u32,
    dirty: bool,
}

impl Default for ConfigRegisters {
    fn default() -> Self {
        let defaults = PersistedConfig::default();
        Self {
            mode: ModeId::default(),
            custom: CustomProfile::default(),
            led_enable: defaults.led_enable,
            led_color_mode: defaults.led_color_mode,
            led_palette: defaults.led_palette_index,
            led_rgb: Rgb::new(defaults.led_r, defaults.led_g, defaults.led_b),
            led_brightness: defaults.led_brightness,
            session_duration_s: defaults.session_duration_s,
            dirty: false,
        }
    }
}

impl ConfigRegisters {
    /// Builds a clean table from a stored record.
    ///
    /// Every field goes through the normal write validation; any rejected
    /// field rejects the whole record.
    pub fn from_persisted(config: &PersistedConfig) -> Result<Self, (Field, RegisterError)> {
        let mut regs = Self::default();
        let writes = [
            (Field::CustomFrequency, RegisterValue::U16(config.frequency_chz)),
            (Field::CustomDuty, RegisterValue::U8(config.duty_percent)),
            (Field::CustomIntensity, RegisterValue::U8(config.intensity_percent)),
            (Field::LedEnable, RegisterValue::Bool(config.led_enable)),
            (Field::LedColorMode, RegisterValue::U8(config.led_color_mode)),
            (Field::LedPalette, RegisterValue::U8(config.led_palette_index)),
            (
                Field::LedRgb,
                RegisterValue::Rgb(Rgb::new(config.led_r, config.led_g, config.led_b)),
            ),
            (Field::LedBrightness, RegisterValue::U8(config.led_brightness)),
            (Field::SessionDuration, RegisterValue::U32(config.session_duration_s)),
        ];
        for (field, value) in writes {
            regs.write(field, value).map_err(|e| (field, e))?;
        }
        regs.dirty = false;
        Ok(regs)
    }

    /// Loads the table from `store`, falling back to defaults on a missing,
    /// mismatched or out-of-range record.
    pub fn restore<S: ConfigStore>(store: &mut S) -> Self {
        let Some(config) = store.load(SCHEMA_SIGNATURE) else {
            log::info!("No stored configuration, using defaults");
            return Self::default();
        };
        match Self::from_persisted(&config) {
            Ok(regs) => {
                log::info!("Restored configuration");
                regs
            }
            Err((field, err)) => {
                log::warn!("Stored {} rejected ({}), using defaults", field.name(), err);
                Self::default()
            }
        }
    }

    /// Persisted subset of the table.
    pub fn to_persisted(&self) -> PersistedConfig {
        PersistedConfig {
            frequency_chz: self.custom.frequency_chz(),
            duty_percent: self.custom.duty_percent(),
            intensity_percent: self.custom.intensity_percent(),
            led_enable: self.led_enable,
            led_color_mode: self.led_color_mode,
            led_palette_index: self.led_palette,
            led_r: self.led_rgb.r,
            led_g: self.led_rgb.g,
            led_b: self.led_rgb.b,
            led_brightness: self.led_brightness,
            session_duration_s: self.session_duration_s,
        }
    }

    /// Returns `true` if any write was accepted since load.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mode most recently selected through the table.
    #[inline]
    pub fn mode(&self) -> ModeId {
        self.mode
    }

    /// Custom profile.
    #[inline]
    pub fn custom(&self) -> CustomProfile {
        self.custom
    }

    /// Snapshot for `ConfigChanged`.
    pub fn live_tuning(&self) -> LiveTuning {
        LiveTuning {
            custom: self.custom,
            indicator: self.indicator(),
            session_duration_s: self.session_duration_s,
        }
    }

    /// Indicator settings derived from the colour fields.
    pub fn indicator(&self) -> IndicatorSettings {
        let color = if self.led_color_mode == 0 {
            ColorSource::Palette(self.led_palette)
        } else {
            ColorSource::Custom(self.led_rgb)
        };
        IndicatorSettings {
            enabled: self.led_enable,
            color,
            brightness_percent: self.led_brightness,
        }
    }

    /// Reads a register; read-only fields come from `status`.
    pub fn read(&self, field: Field, status: &StatusBoard) -> RegisterValue {
        match field {
            Field::Mode => RegisterValue::U8(status.active_mode().index()),
            Field::CustomFrequency => RegisterValue::U16(self.custom.frequency_chz()),
            Field::CustomDuty => RegisterValue::U8(self.custom.duty_percent()),
            Field::CustomIntensity => RegisterValue::U8(self.custom.intensity_percent()),
            Field::LedEnable => RegisterValue::Bool(self.led_enable),
            Field::LedColorMode => RegisterValue::U8(self.led_color_mode),
            Field::LedPalette => RegisterValue::U8(self.led_palette),
            Field::LedRgb => RegisterValue::Rgb(self.led_rgb),
            Field::LedBrightness => RegisterValue::U8(self.led_brightness),
            Field::SessionDuration => RegisterValue::U32(self.session_duration_s),
            Field::SessionTime => RegisterValue::U32(status.session_elapsed_s()),
            Field::BatteryLevel => RegisterValue::U8(status.battery_percent()),
        }
    }

    /// Validates and stores a write.
    pub fn write(&mut self, field: Field, value: RegisterValue) -> Result<WriteEffect, RegisterError> {
        field.validate(value)?;

        let effect = match (field, value) {
            (Field::Mode, RegisterValue::U8(v)) => {
                let id = ModeId::from_index(v).ok_or(RegisterError::OutOfRange)?;
                self.mode = id;
                WriteEffect::SwitchMode(id)
            }
            (Field::CustomFrequency, RegisterValue::U16(v)) => {
                self.custom = self
                    .custom
                    .with_frequency_chz(v)
                    .map_err(|_| RegisterError::OutOfRange)?;
                WriteEffect::Tuning
            }
            (Field::CustomDuty, RegisterValue::U8(v)) => {
                self.custom = self
                    .custom
                    .with_duty_percent(v)
                    .map_err(|_| RegisterError::OutOfRange)?;
                WriteEffect::Tuning
            }
            (Field::CustomIntensity, RegisterValue::U8(v)) => {
                self.custom = self
                    .custom
                    .with_intensity_percent(v)
                    .map_err(|_| RegisterError::OutOfRange)?;
                WriteEffect::Tuning
            }
            (Field::LedEnable, RegisterValue::Bool(v)) => {
                self.led_enable = v;
                WriteEffect::Tuning
            }
            (Field::LedColorMode, RegisterValue::U8(v)) => {
                self.led_color_mode = v;
                WriteEffect::Tuning
            }
            (Field::LedPalette, RegisterValue::U8(v)) => {
                self.led_palette = v;
                WriteEffect::Tuning
            }
            (Field::LedRgb, RegisterValue::Rgb(v)) => {
                self.led_rgb = v;
                WriteEffect::Tuning
            }
            (Field::LedBrightness, RegisterValue::U8(v)) => {
                self.led_brightness = v;
                WriteEffect::Tuning
            }
            (Field::SessionDuration, RegisterValue::U32(v)) => {
                self.session_duration_s = v;
                WriteEffect::Device
            }
            _ => return Err(RegisterError::TypeMismatch),
        };

        self.dirty = true;
        Ok(effect)
    }
}
