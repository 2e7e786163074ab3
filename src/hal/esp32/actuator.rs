//! H-bridge actuator on two LEDC PWM channels.
//!
//! | Output | IN1 | IN2 |
//! |--------|-----|-----|
//! | forward | duty | 0 |
//! | reverse | 0 | duty |
//! | coast | 0 | 0 |
//!
//! The inactive input is always released before the active one is driven,
//! so both inputs are never high together.

use crate::traits::ActuatorDriver;
use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::ledc::{config::TimerConfig, LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_hal::sys::EspError;

/// H-bridge driver, 25 kHz at 10-bit resolution.
///
/// ```ignore
/// use bilateral_haptic::hal::esp32::Esp32HBridge;
///
/// let peripherals = Peripherals::take()?;
/// let bridge = Esp32HBridge::new(
///     peripherals.pins.gpio20,
///     peripherals.pins.gpio19,
///     peripherals.ledc.timer0,
///     peripherals.ledc.channel0,
///     peripherals.ledc.channel1,
/// )?;
/// ```
pub struct Esp32HBridge<'d> {
    in1: LedcDriver<'d>,
    in2: LedcDriver<'d>,
}

impl<'d> Esp32HBridge<'d> {
    /// PWM frequency (above the audible range).
    const PWM_FREQ_HZ: u32 = 25_000;

    const PWM_RESOLUTION: Resolution = Resolution::Bits10;

    /// Creates the driver and leaves the bridge coasting.
    pub fn new<T, TI, C1, C1I, C2, C2I>(
        in1_pin: impl Peripheral<P = impl OutputPin> + 'd,
        in2_pin: impl Peripheral<P = impl OutputPin> + 'd,
        timer: T,
        in1_channel: C1,
        in2_channel: C2,
    ) -> Result<Self, EspError>
    where
        TI: LedcTimer + 'd,
        T: Peripheral<P = TI> + 'd,
        C1I: LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        C1: Peripheral<P = C1I> + 'd,
        C2I: LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        C2: Peripheral<P = C2I> + 'd,
    {
        let timer_config = TimerConfig::default()
            .frequency(Self::PWM_FREQ_HZ.Hz())
            .resolution(Self::PWM_RESOLUTION);
        let timer_driver = LedcTimerDriver::new(timer, &timer_config)?;

        let in1 = LedcDriver::new(in1_channel, &timer_driver, in1_pin)?;
        let in2 = LedcDriver::new(in2_channel, &timer_driver, in2_pin)?;

        let mut bridge = Self { in1, in2 };
        bridge.coast()?;
        log::info!("H-bridge ready ({} Hz, 10-bit)", Self::PWM_FREQ_HZ);
        Ok(bridge)
    }

    fn duty(channel: &LedcDriver<'d>, intensity_percent: u8) -> u32 {
        channel.get_max_duty() * u32::from(intensity_percent.min(100)) / 100
    }
}

impl ActuatorDriver for Esp32HBridge<'_> {
    type Error = EspError;

    fn drive_forward(&mut self, intensity_percent: u8) -> Result<(), EspError> {
        self.in2.set_duty(0)?;
        let duty = Self::duty(&self.in1, intensity_percent);
        self.in1.set_duty(duty)
    }

    fn drive_reverse(&mut self, intensity_percent: u8) -> Result<(), EspError> {
        self.in1.set_duty(0)?;
        let duty = Self::duty(&self.in2, intensity_percent);
        self.in2.set_duty(duty)
    }

    fn coast(&mut self) -> Result<(), EspError> {
        // release both even if the first fails
        let first = self.in1.set_duty(0);
        let second = self.in2.set_duty(0);
        first.and(second)
    }
}
