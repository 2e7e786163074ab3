//! Session button on an RTC-capable GPIO.
//!
//! Active low with the internal pull-up. The same pin is the deep-sleep wake
//! source, see [`Esp32Sleep`](super::Esp32Sleep).

use crate::traits::ButtonInput;
use esp_idf_hal::gpio::{Input, InputPin, OutputPin, PinDriver, Pull};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::sys::EspError;

/// Debounce-free level reader; the Input Handler debounces.
pub struct Esp32Button<'d, P: InputPin + OutputPin> {
    pin: PinDriver<'d, P, Input>,
}

impl<'d, P: InputPin + OutputPin> Esp32Button<'d, P> {
    /// Configures the pin as a pulled-up input.
    pub fn new(pin: impl Peripheral<P = P> + 'd) -> Result<Self, EspError> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        Ok(Self { pin })
    }
}

impl<P: InputPin + OutputPin> ButtonInput for Esp32Button<'_, P> {
    #[inline]
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low()
    }
}
