//! XIAO ESP32-C6 bilateral haptic device firmware.
//!
//! Boot sequence:
//! - Check the battery; a critical cell flashes (when it can) and sleeps
//!   straight away, a low cell flashes a warning and carries on
//! - Start the controller, input, wireless and guardian tasks
//! - Park the main task until the controller reports a shutdown
//!
//! The button wakes the device from deep sleep, which restarts it here.
//!
//! # Build
//!
//! ```bash
//! # Alternation, button and battery only
//! cargo build --release --features esp32
//!
//! # With the SoftAP register surface
//! cargo build --release --features wifi
//! ```

use bilateral_haptic::config::{AccessPointConfig, DeviceConfig};
use bilateral_haptic::hal::esp32::{
    pins, shared_adc, Esp32BackEmf, Esp32Battery, Esp32Button, Esp32Clock, Esp32Delay,
    Esp32HBridge, Esp32Indicator, Esp32NvsStore, Esp32Sleep,
};
use bilateral_haptic::power::{boot_check, BootVerdict};
use bilateral_haptic::runtime::{spawn_system, Hardware};
use bilateral_haptic::shutdown::{flash_pattern, sleep_now, LOW_BATTERY_COLOR};
use bilateral_haptic::status::LinkStatus;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    log::info!("bilateral-haptic {}", env!("CARGO_PKG_VERSION"));

    let config = DeviceConfig::default();
    let peripherals = Peripherals::take()?;
    let pins_in = peripherals.pins;

    // =========================================================================
    // Power check
    // =========================================================================
    let adc = shared_adc(peripherals.adc1)?;
    let mut battery = Esp32Battery::new(adc.clone(), pins_in.gpio2, pins_in.gpio21, config.battery.clone())?;

    let mut indicator = Esp32Indicator::new(peripherals.rmt.channel0, pins_in.gpio17, pins_in.gpio16)?;
    let sleep = Esp32Sleep::new(pins::BUTTON)
        .with_held_gpio(pins::BATTERY_ENABLE)
        .with_held_gpio(pins::LED_POWER);
    let mut delay = Esp32Delay;

    match boot_check(&mut battery, &config.battery) {
        BootVerdict::Proceed => {}
        BootVerdict::ProceedWithWarning(reading) => {
            log::warn!("Battery low at boot: {:.2} V", reading.voltage);
            flash_pattern(
                &mut indicator,
                &mut delay,
                LOW_BATTERY_COLOR,
                config.shutdown.warning_flashes,
                config.shutdown.warning_flash_ms,
            );
        }
        BootVerdict::Sleep { reading, flash } => {
            log::error!("Battery critical at boot: {:.2} V", reading.voltage);
            if flash {
                flash_pattern(
                    &mut indicator,
                    &mut delay,
                    LOW_BATTERY_COLOR,
                    config.shutdown.warning_flashes,
                    config.shutdown.warning_flash_ms,
                );
            }
            sleep_now(sleep, delay);
        }
    }

    // =========================================================================
    // Hardware
    // =========================================================================
    let actuator = Esp32HBridge::new(
        pins_in.gpio20,
        pins_in.gpio19,
        peripherals.ledc.timer0,
        peripherals.ledc.channel0,
        peripherals.ledc.channel1,
    )?;
    let back_emf = Esp32BackEmf::new(adc, pins_in.gpio0)?;
    let button = Esp32Button::new(pins_in.gpio1)?;

    let nvs = EspDefaultNvsPartition::take()?;
    let store = Esp32NvsStore::new(nvs.clone())?;

    let link = Arc::new(LinkStatus::new());
    let access_point = AccessPointConfig::default()
        .with_ssid(option_env!("HAPTIC_SSID").unwrap_or("bilateral-haptic"))
        .with_password(option_env!("HAPTIC_PASSWORD").unwrap_or(""));

    #[cfg(feature = "wifi")]
    let transport = {
        let sysloop = esp_idf_svc::eventloop::EspSystemEventLoop::take()?;
        bilateral_haptic::hal::esp32::Esp32SoftApTransport::new(
            peripherals.modem,
            sysloop,
            Some(nvs),
            &access_point,
            link.clone(),
        )?
    };

    #[cfg(not(feature = "wifi"))]
    let transport = {
        log::info!("Built without wifi; '{}' stays off", access_point.ssid);
        drop(nvs);
        radio_off::RadioOff
    };

    // =========================================================================
    // Tasks
    // =========================================================================
    let hardware = Hardware {
        actuator,
        indicator,
        back_emf,
        button,
        battery,
        transport,
        store,
        sleep,
    };

    let system = spawn_system(hardware, &config, link, Esp32Clock::new(), Esp32Delay)?;
    log::info!("Session started in {:?}", system.status.active_mode());

    // The controller thread enters deep sleep itself; this only returns if it
    // died before getting there.
    let report = system.wait_for_shutdown()?;
    log::info!("Shutdown: {:?}", report.reason);
    loop {
        std::thread::park();
    }
}

#[cfg(not(feature = "wifi"))]
mod radio_off {
    use bilateral_haptic::traits::{RegisterOp, RegisterReply, WirelessTransport};
    use core::convert::Infallible;

    /// Transport for builds without a radio: never advertises, never
    /// receives a request.
    pub struct RadioOff;

    impl WirelessTransport for RadioOff {
        type Error = Infallible;

        fn start_advertising(&mut self) -> Result<(), Infallible> {
            log::debug!("Advertising requested with the radio compiled out");
            Ok(())
        }

        fn stop_advertising(&mut self) -> Result<(), Infallible> {
            Ok(())
        }

        fn poll_request(&mut self) -> Option<RegisterOp> {
            None
        }

        fn respond(&mut self, _reply: RegisterReply) {}
    }
}
