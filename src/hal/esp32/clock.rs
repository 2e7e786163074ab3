//! Time sources backed by ESP-IDF.

use crate::traits::{Clock, Delay};
use esp_idf_hal::delay::FreeRtos;

/// Milliseconds since boot from `esp_timer_get_time()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates the clock.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        // SAFETY: reads the free-running system timer; no side effects
        let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
        (micros / 1000) as u64
    }
}

/// Blocking delay that yields to the FreeRTOS scheduler.
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32Delay;

impl Delay for Esp32Delay {
    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}
