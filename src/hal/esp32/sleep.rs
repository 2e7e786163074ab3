//! Deep sleep with the session button as the only wake source.

use crate::traits::{PowerError, SleepControl};
use core::convert::Infallible;
use esp_idf_hal::sys;

/// Sleep controller.
///
/// `power_down_peripherals` latches the auxiliary power switches (battery
/// divider enable, LED power) at their current idle levels so they stay off
/// through deep sleep. Their owners leave them idle before handing over.
pub struct Esp32Sleep {
    wake_gpio: i32,
    held_gpios: heapless::Vec<i32, 4>,
}

impl Esp32Sleep {
    /// Creates a controller waking on `wake_gpio` going low.
    pub fn new(wake_gpio: i32) -> Self {
        Self {
            wake_gpio,
            held_gpios: heapless::Vec::new(),
        }
    }

    /// Adds a power-switch GPIO to latch before sleep. At most four.
    pub fn with_held_gpio(mut self, gpio: i32) -> Self {
        if self.held_gpios.push(gpio).is_err() {
            log::warn!("Too many held GPIOs, ignoring GPIO{}", gpio);
        }
        self
    }
}

fn check(code: sys::esp_err_t, wrap: fn(i32) -> PowerError) -> Result<(), PowerError> {
    if code == sys::ESP_OK {
        Ok(())
    } else {
        Err(wrap(code))
    }
}

impl SleepControl for Esp32Sleep {
    type Error = PowerError;

    fn power_down_peripherals(&mut self) -> Result<(), PowerError> {
        for &gpio in &self.held_gpios {
            // SAFETY: latches the output level of a configured output pin
            check(unsafe { sys::gpio_hold_en(gpio) }, PowerError::Peripheral)?;
        }
        Ok(())
    }

    fn arm_wake_source(&mut self) -> Result<(), PowerError> {
        // SAFETY: plain ESP-IDF sleep configuration calls with a valid pin mask
        unsafe {
            check(
                sys::esp_sleep_disable_wakeup_source(sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_ALL),
                PowerError::WakeSource,
            )?;
            check(
                sys::esp_sleep_enable_ext1_wakeup(
                    1u64 << self.wake_gpio,
                    sys::esp_sleep_ext1_wakeup_mode_t_ESP_EXT1_WAKEUP_ANY_LOW,
                ),
                PowerError::WakeSource,
            )?;
        }
        log::info!("Wake source armed on GPIO{}", self.wake_gpio);
        Ok(())
    }

    fn enter_lowest_power_state(&mut self) -> Result<Infallible, PowerError> {
        // SAFETY: does not return; the chip resets on wake
        unsafe { sys::esp_deep_sleep_start() }
    }
}
