//! ADC1 oneshot channels for battery voltage and back-EMF.
//!
//! # Wiring
//!
//! - GPIO0 (ADC1_CH0): back-EMF sense amplifier output, biased at 1.65 V
//! - GPIO2 (ADC1_CH2): battery through a 3.3 kΩ / 10 kΩ divider
//! - GPIO21: divider enable, high only while a battery read is in progress
//!
//! Both channels share one [`AdcDriver`]; the battery channel belongs to the
//! Power Guardian and the back-EMF channel to the Actuator Controller.

use crate::backemf::pin_to_back_emf_mv;
use crate::config::BatteryThresholds;
use crate::traits::{BackEmfSensor, BatteryReading, SensorError, VoltageSensor};
use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{Gpio0, Gpio2, Gpio21, Output, PinDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::sys::EspError;
use std::sync::Arc;

/// Shared ADC1 unit.
pub type SharedAdc = Arc<AdcDriver<'static, ADC1>>;

/// Full-scale pin voltage of a 12-bit raw sample.
const FULL_SCALE_MV: u32 = 3300;
const FULL_SCALE_RAW: u32 = 4095;

/// Divider multiplier: (3.3 kΩ + 10 kΩ) / 10 kΩ.
const DIVIDER_MULTIPLIER: f32 = 13.3 / 10.0;

/// Settle time after the divider is enabled.
const ENABLE_SETTLE_MS: u32 = 10;

fn raw_to_pin_mv(raw: u16) -> u32 {
    u32::from(raw) * FULL_SCALE_MV / FULL_SCALE_RAW
}

fn sensor_error(e: EspError) -> SensorError {
    SensorError::Driver(e.code())
}

fn channel_config() -> AdcChannelConfig {
    AdcChannelConfig {
        attenuation: DB_11,
        ..Default::default()
    }
}

/// Opens ADC1 for sharing.
pub fn shared_adc(adc: impl Peripheral<P = ADC1> + 'static) -> Result<SharedAdc, EspError> {
    Ok(Arc::new(AdcDriver::new(adc)?))
}

/// Back-EMF channel on GPIO0.
pub struct Esp32BackEmf {
    channel: AdcChannelDriver<'static, Gpio0, SharedAdc>,
}

impl Esp32BackEmf {
    /// Configures the channel.
    pub fn new(adc: SharedAdc, pin: impl Peripheral<P = Gpio0> + 'static) -> Result<Self, EspError> {
        let channel = AdcChannelDriver::new(adc, pin, &channel_config())?;
        Ok(Self { channel })
    }
}

impl BackEmfSensor for Esp32BackEmf {
    type Error = SensorError;

    fn read_millivolts(&mut self) -> Result<i32, SensorError> {
        let raw = self.channel.read_raw().map_err(sensor_error)?;
        Ok(pin_to_back_emf_mv(raw_to_pin_mv(raw) as i32))
    }
}

/// Battery channel on GPIO2 with the divider enable on GPIO21.
pub struct Esp32Battery {
    channel: AdcChannelDriver<'static, Gpio2, SharedAdc>,
    enable: PinDriver<'static, Gpio21, Output>,
    thresholds: BatteryThresholds,
}

impl Esp32Battery {
    /// Configures the channel and leaves the divider disabled.
    pub fn new(
        adc: SharedAdc,
        pin: impl Peripheral<P = Gpio2> + 'static,
        enable_pin: impl Peripheral<P = Gpio21> + 'static,
        thresholds: BatteryThresholds,
    ) -> Result<Self, EspError> {
        let channel = AdcChannelDriver::new(adc, pin, &channel_config())?;
        let mut enable = PinDriver::output(enable_pin)?;
        enable.set_low()?;
        Ok(Self {
            channel,
            enable,
            thresholds,
        })
    }
}

impl VoltageSensor for Esp32Battery {
    type Error = SensorError;

    fn read_battery(&mut self) -> Result<BatteryReading, SensorError> {
        self.enable.set_high().map_err(sensor_error)?;
        FreeRtos::delay_ms(ENABLE_SETTLE_MS);
        let raw = self.channel.read_raw();
        // disable before propagating a read failure
        if let Err(e) = self.enable.set_low() {
            log::warn!("Battery divider disable failed: {}", e);
        }
        let raw = raw.map_err(sensor_error)?;

        let voltage = raw_to_pin_mv(raw) as f32 / 1000.0 * DIVIDER_MULTIPLIER;
        Ok(BatteryReading {
            voltage,
            percent: self.thresholds.percent(voltage),
        })
    }
}
