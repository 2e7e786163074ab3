//! WS2812 RGB indicator over RMT.
//!
//! The LED sits behind a P-MOSFET power switch (GPIO16, low = powered) and
//! takes its data on GPIO17. `clear()` cuts the power as well as sending
//! black, so the LED draws nothing while dark.

use crate::traits::{Indicator, Rgb};
use core::time::Duration;
use esp_idf_hal::gpio::{Output, OutputPin, PinDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse, RmtChannel, TxRmtDriver};
use esp_idf_hal::sys::EspError;

/// Bit timings from the WS2812 datasheet.
const T0H: Duration = Duration::from_nanos(350);
const T0L: Duration = Duration::from_nanos(800);
const T1H: Duration = Duration::from_nanos(700);
const T1L: Duration = Duration::from_nanos(600);

/// Single WS2812 pixel with a power-enable switch.
pub struct Esp32Indicator<'d, E: OutputPin> {
    tx: TxRmtDriver<'d>,
    power: PinDriver<'d, E, Output>,
    bits: [(Pulse, Pulse); 2],
    powered: bool,
}

impl<'d, E: OutputPin> Esp32Indicator<'d, E> {
    /// Configures the RMT channel and leaves the LED unpowered.
    pub fn new<C: RmtChannel>(
        channel: impl Peripheral<P = C> + 'd,
        data_pin: impl Peripheral<P = impl OutputPin> + 'd,
        power_pin: impl Peripheral<P = E> + 'd,
    ) -> Result<Self, EspError> {
        let config = TransmitConfig::new().clock_divider(1);
        let tx = TxRmtDriver::new(channel, data_pin, &config)?;
        let ticks_hz = tx.counter_clock()?;
        let bits = [
            (
                Pulse::new_with_duration(ticks_hz, PinState::High, &T0H)?,
                Pulse::new_with_duration(ticks_hz, PinState::Low, &T0L)?,
            ),
            (
                Pulse::new_with_duration(ticks_hz, PinState::High, &T1H)?,
                Pulse::new_with_duration(ticks_hz, PinState::Low, &T1L)?,
            ),
        ];

        let mut power = PinDriver::output(power_pin)?;
        power.set_high()?;
        Ok(Self {
            tx,
            power,
            bits,
            powered: false,
        })
    }

    fn send(&mut self, color: Rgb) -> Result<(), EspError> {
        // wire order is green, red, blue, MSB first
        let word = (u32::from(color.g) << 16) | (u32::from(color.r) << 8) | u32::from(color.b);
        let mut signal = FixedLengthSignal::<24>::new();
        for i in 0..24 {
            let bit = (word >> (23 - i)) & 1;
            signal.set(i, &self.bits[bit as usize])?;
        }
        self.tx.start_blocking(&signal)
    }
}

impl<E: OutputPin> Indicator for Esp32Indicator<'_, E> {
    type Error = EspError;

    fn show(&mut self, color: Rgb, brightness_percent: u8) -> Result<(), EspError> {
        if !self.powered {
            self.power.set_low()?;
            self.powered = true;
        }
        self.send(color.scaled(brightness_percent))
    }

    fn clear(&mut self) -> Result<(), EspError> {
        if !self.powered {
            return Ok(());
        }
        self.send(Rgb::new(0, 0, 0))?;
        self.power.set_high()?;
        self.powered = false;
        Ok(())
    }
}
