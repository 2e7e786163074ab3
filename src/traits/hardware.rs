//! Hardware abstraction traits for the actuator, indicator, sensors and sleep.
//!
//! This module defines the hardware interfaces the control core consumes, so
//! the same state machines run against the ESP32 drivers and the desktop mocks.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`ActuatorDriver`] | H-bridge drive in either polarity, or coast |
//! | [`Indicator`] | RGB visual feedback |
//! | [`BackEmfSensor`] | Millivolt reading of the actuator terminals |
//! | [`VoltageSensor`] | Battery voltage and percentage |
//! | [`ButtonInput`] | Level of the single user button |
//! | [`SleepControl`] | Peripheral power-down, wake arming, sleep entry |
//! | [`Clock`] | Monotonic millisecond time source |
//! | [`Delay`] | Blocking millisecond delay |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use bilateral_haptic::traits::{ActuatorDriver, Direction};
//! use bilateral_haptic::hal::{MockActuator, MockClock};
//!
//! let clock = MockClock::new();
//! let mut actuator = MockActuator::new(clock.clone());
//! actuator.drive(Direction::Forward, 75).unwrap();
//! actuator.coast().unwrap();
//! assert!(actuator.is_neutral());
//! ```

use core::convert::Infallible;
use core::fmt::{self, Debug};

/// Polarity of one half-cycle of the bilateral pattern.
///
/// The alternation always runs forward first, then reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// First half-cycle (IN1 driven).
    Forward,
    /// Second half-cycle (IN2 driven).
    Reverse,
}

impl Direction {
    /// Short label used in back-EMF log lines.
    ///
    /// ```
    /// use bilateral_haptic::Direction;
    ///
    /// assert_eq!(Direction::Forward.label(), "FWD");
    /// assert_eq!(Direction::Reverse.label(), "REV");
    /// ```
    #[inline]
    pub const fn label(&self) -> &'static str {
        match self {
            Direction::Forward => "FWD",
            Direction::Reverse => "REV",
        }
    }

    /// The other half-cycle.
    #[inline]
    pub const fn opposite(&self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// An 8-bit-per-channel colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Creates a colour from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel by `percent` (0-100).
    ///
    /// ```
    /// use bilateral_haptic::Rgb;
    ///
    /// assert_eq!(Rgb::new(255, 100, 0).scaled(20), Rgb::new(51, 20, 0));
    /// assert_eq!(Rgb::new(255, 255, 255).scaled(150), Rgb::new(255, 255, 255));
    /// ```
    pub fn scaled(&self, percent: u8) -> Self {
        let pct = u16::from(percent.min(100));
        let scale = |c: u8| ((u16::from(c) * pct) / 100) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

/// H-bridge actuator driver.
///
/// The Actuator Controller is the only caller during a session; the shutdown
/// path takes the driver over afterwards. Every method must be idempotent:
/// calling `coast()` on an already-coasting bridge is a no-op, not an error.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use bilateral_haptic::traits::ActuatorDriver;
///
/// struct MyBridge { /* PWM handles */ }
///
/// impl ActuatorDriver for MyBridge {
///     type Error = ();
///
///     fn drive_forward(&mut self, intensity_percent: u8) -> Result<(), ()> {
///         // IN1 = duty, IN2 = 0
///         Ok(())
///     }
///
///     fn drive_reverse(&mut self, intensity_percent: u8) -> Result<(), ()> {
///         // IN1 = 0, IN2 = duty
///         Ok(())
///     }
///
///     fn coast(&mut self) -> Result<(), ()> {
///         // IN1 = IN2 = 0
///         Ok(())
///     }
/// }
/// ```
pub trait ActuatorDriver {
    /// Error type for driver operations.
    type Error: Debug;

    /// Drives the forward polarity at `intensity_percent` duty.
    fn drive_forward(&mut self, intensity_percent: u8) -> Result<(), Self::Error>;

    /// Drives the reverse polarity at `intensity_percent` duty.
    fn drive_reverse(&mut self, intensity_percent: u8) -> Result<(), Self::Error>;

    /// Releases both bridge inputs (neutral output).
    fn coast(&mut self) -> Result<(), Self::Error>;

    /// Drives in the given direction.
    fn drive(&mut self, direction: Direction, intensity_percent: u8) -> Result<(), Self::Error> {
        match direction {
            Direction::Forward => self.drive_forward(intensity_percent),
            Direction::Reverse => self.drive_reverse(intensity_percent),
        }
    }
}

/// Visual indicator (a single RGB LED).
pub trait Indicator {
    /// Error type for indicator operations.
    type Error: Debug;

    /// Lights the indicator with `color` at `brightness_percent`.
    fn show(&mut self, color: Rgb, brightness_percent: u8) -> Result<(), Self::Error>;

    /// Turns the indicator off.
    fn clear(&mut self) -> Result<(), Self::Error>;
}

/// Sensor read failures shared by the battery and back-EMF channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorError {
    /// The converter did not produce a sample in time.
    Timeout,
    /// The raw sample could not be converted to a voltage.
    Conversion,
    /// Driver-level error code.
    Driver(i32),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Timeout => write!(f, "sensor read timed out"),
            SensorError::Conversion => write!(f, "sensor conversion failed"),
            SensorError::Driver(code) => write!(f, "sensor driver error {code}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SensorError {}

/// Low-power control failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerError {
    /// A peripheral rail could not be switched off.
    Peripheral(i32),
    /// The wake source could not be armed.
    WakeSource(i32),
    /// Sleep entry returned.
    SleepRejected,
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerError::Peripheral(code) => write!(f, "peripheral power-down failed ({code})"),
            PowerError::WakeSource(code) => write!(f, "wake source arming failed ({code})"),
            PowerError::SleepRejected => write!(f, "sleep entry returned"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PowerError {}

/// Back-EMF sense channel on the actuator terminals.
pub trait BackEmfSensor {
    /// Error type for sensor reads.
    type Error: Debug;

    /// Returns the back-EMF in millivolts (signed, bias removed).
    fn read_millivolts(&mut self) -> Result<i32, Self::Error>;
}

/// One battery measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatteryReading {
    /// Cell voltage in volts.
    pub voltage: f32,
    /// State of charge, 0-100.
    pub percent: u8,
}

/// Battery voltage sensor.
pub trait VoltageSensor {
    /// Error type for sensor reads.
    type Error: Debug;

    /// Samples the battery once.
    fn read_battery(&mut self) -> Result<BatteryReading, Self::Error>;
}

/// The single user button, sampled by polling.
pub trait ButtonInput {
    /// Returns `true` while the button is held down.
    fn is_pressed(&mut self) -> bool;
}

/// Low-power control for the end of a session.
pub trait SleepControl {
    /// Error type for power operations.
    type Error: Debug;

    /// Powers down auxiliary peripherals (LED rail, sensor dividers, radio).
    fn power_down_peripherals(&mut self) -> Result<(), Self::Error>;

    /// Arms the button as the wake source.
    fn arm_wake_source(&mut self) -> Result<(), Self::Error>;

    /// Enters the lowest-power state. Only returns on failure.
    fn enter_lowest_power_state(&mut self) -> Result<Infallible, Self::Error>;
}

/// Clock trait for time tracking.
///
/// The controller and handlers read time through this trait so tests can
/// run them against a virtual clock.
pub trait Clock {
    /// Returns the current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

/// Blocking delay.
pub trait Delay {
    /// Blocks the calling task for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TestBridge {
        forward: Option<u8>,
        reverse: Option<u8>,
    }

    impl ActuatorDriver for TestBridge {
        type Error = ();

        fn drive_forward(&mut self, intensity_percent: u8) -> Result<(), ()> {
            self.forward = Some(intensity_percent);
            self.reverse = None;
            Ok(())
        }

        fn drive_reverse(&mut self, intensity_percent: u8) -> Result<(), ()> {
            self.forward = None;
            self.reverse = Some(intensity_percent);
            Ok(())
        }

        fn coast(&mut self) -> Result<(), ()> {
            self.forward = None;
            self.reverse = None;
            Ok(())
        }
    }

    #[test]
    fn drive_dispatches_on_direction() {
        let mut bridge = TestBridge::default();
        bridge.drive(Direction::Forward, 60).unwrap();
        assert_eq!(bridge.forward, Some(60));
        assert_eq!(bridge.reverse, None);

        bridge.drive(Direction::Reverse, 70).unwrap();
        assert_eq!(bridge.forward, None);
        assert_eq!(bridge.reverse, Some(70));
    }

    #[test]
    fn coast_is_idempotent() {
        let mut bridge = TestBridge::default();
        bridge.drive_forward(50).unwrap();
        bridge.coast().unwrap();
        bridge.coast().unwrap();
        assert_eq!(bridge.forward, None);
        assert_eq!(bridge.reverse, None);
    }

    #[test]
    fn direction_alternates() {
        assert_eq!(Direction::Forward.opposite(), Direction::Reverse);
        assert_eq!(Direction::Reverse.opposite(), Direction::Forward);
    }

    #[test]
    fn scaled_color_clamps_percent() {
        assert_eq!(Rgb::new(200, 100, 50).scaled(0), Rgb::new(0, 0, 0));
        assert_eq!(Rgb::new(200, 100, 50).scaled(100), Rgb::new(200, 100, 50));
        assert_eq!(Rgb::new(200, 100, 50).scaled(255), Rgb::new(200, 100, 50));
    }
}
