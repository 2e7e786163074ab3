//! ESP32-C6 hardware abstraction layer for the haptic device.
//!
//! # Hardware Configuration
//!
//! - **MCU**: Seeed XIAO ESP32-C6
//! - **Actuator**: ERM/LRA through a DRV8833-class H-bridge on two LEDC channels
//! - **Indicator**: one WS2812 behind a P-MOSFET power switch
//! - **Button**: momentary switch to ground, doubles as the wake source
//! - **Battery**: single Li-ion cell through a switched divider
//!
//! See the [`pins`] module for GPIO assignments.

mod actuator;
mod analog;
mod button;
mod clock;
mod indicator;
mod nvs;
mod sleep;

pub use actuator::Esp32HBridge;
pub use analog::{shared_adc, Esp32BackEmf, Esp32Battery, SharedAdc};
pub use button::Esp32Button;
pub use clock::{Esp32Clock, Esp32Delay};
pub use indicator::Esp32Indicator;
pub use nvs::Esp32NvsStore;
pub use sleep::Esp32Sleep;

#[cfg(feature = "wifi")]
mod wifi;
#[cfg(feature = "wifi")]
pub use wifi::Esp32SoftApTransport;

/// Pin assignments for the XIAO ESP32-C6 board.
pub mod pins {
    // =========================================================================
    // Actuator (H-bridge)
    // =========================================================================

    /// Forward input (IN1, LEDC PWM)
    pub const HBRIDGE_IN1: i32 = 20;

    /// Reverse input (IN2, LEDC PWM)
    pub const HBRIDGE_IN2: i32 = 19;

    // =========================================================================
    // Analog (ADC1)
    // =========================================================================

    /// Back-EMF sense amplifier output (ADC1_CH0)
    pub const BACK_EMF: i32 = 0;

    /// Battery divider tap (ADC1_CH2)
    pub const BATTERY: i32 = 2;

    /// Battery divider enable (high = connected)
    pub const BATTERY_ENABLE: i32 = 21;

    // =========================================================================
    // Button and indicator
    // =========================================================================

    /// Session button (active low, RTC wake capable)
    pub const BUTTON: i32 = 1;

    /// WS2812 power switch (low = powered)
    pub const LED_POWER: i32 = 16;

    /// WS2812 data input (RMT TX)
    pub const LED_DATA: i32 = 17;
}
