//! The Power Guardian: boot voltage check and periodic battery monitoring.
//!
//! # Voltage Bands
//!
//! | Voltage | Band | Boot | Runtime |
//! |---------|------|------|---------|
//! | < 0.5 V | [`BatteryLevel::Absent`] | proceed (bench power) | ignored |
//! | ≤ 3.2 V | [`BatteryLevel::Critical`] | sleep, flash first if ≥ 3.0 V | `BatteryCritical`, stop |
//! | ≤ 3.4 V | [`BatteryLevel::Low`] | proceed after a warning flash | `BatteryWarning` |
//! | above | [`BatteryLevel::Normal`] | proceed | percent published |
//!
//! Read failures are fail-open: logged and treated as "no decision".
//!
//! ```rust
//! use bilateral_haptic::config::BatteryThresholds;
//! use bilateral_haptic::power::{classify, BatteryLevel};
//!
//! let t = BatteryThresholds::default();
//! assert_eq!(classify(3.2, &t), BatteryLevel::Critical);
//! assert_eq!(classify(3.21, &t), BatteryLevel::Low);
//! assert_eq!(classify(0.2, &t), BatteryLevel::Absent);
//! ```

use crate::config::BatteryThresholds;
use crate::messages::{ControlMessage, Outbox};
use crate::status::StatusBoard;
use crate::traits::{BatteryReading, Delay, VoltageSensor};
use alloc::sync::Arc;

/// Voltage band of a reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatteryLevel {
    /// No cell attached.
    Absent,
    /// At or below the cutoff.
    Critical,
    /// Between the cutoff and the warning threshold (inclusive).
    Low,
    /// Healthy.
    Normal,
}

/// Classifies a voltage. Both thresholds are inclusive on the low side.
pub fn classify(voltage: f32, thresholds: &BatteryThresholds) -> BatteryLevel {
    if voltage < thresholds.no_battery_v {
        BatteryLevel::Absent
    } else if voltage <= thresholds.cutoff_v {
        BatteryLevel::Critical
    } else if voltage <= thresholds.warning_v {
        BatteryLevel::Low
    } else {
        BatteryLevel::Normal
    }
}

/// Outcome of the boot check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BootVerdict {
    /// Start normally.
    Proceed,
    /// Start after a warning flash.
    ProceedWithWarning(BatteryReading),
    /// Go straight to sleep.
    Sleep {
        /// The critical reading.
        reading: BatteryReading,
        /// Flash a warning before sleeping.
        flash: bool,
    },
}

/// Synchronous battery check, run before anything drives the actuator.
pub fn boot_check<V: VoltageSensor>(sensor: &mut V, thresholds: &BatteryThresholds) -> BootVerdict {
    let reading = match sensor.read_battery() {
        Ok(reading) => reading,
        Err(e) => {
            log::warn!("Boot battery check failed ({:?}), continuing", e);
            return BootVerdict::Proceed;
        }
    };
    log::info!("Battery: {:.2} V [{}%]", reading.voltage, reading.percent);

    match classify(reading.voltage, thresholds) {
        BatteryLevel::Absent => {
            log::warn!("No battery detected ({:.2} V), continuing", reading.voltage);
            BootVerdict::Proceed
        }
        BatteryLevel::Critical => {
            log::warn!(
                "Battery at cutoff ({:.2} V <= {:.2} V), sleeping",
                reading.voltage,
                thresholds.cutoff_v
            );
            BootVerdict::Sleep {
                reading,
                flash: reading.voltage >= thresholds.flash_floor_v,
            }
        }
        BatteryLevel::Low => {
            log::warn!("Battery low ({:.2} V)", reading.voltage);
            BootVerdict::ProceedWithWarning(reading)
        }
        BatteryLevel::Normal => BootVerdict::Proceed,
    }
}

/// Runtime battery monitor.
pub struct PowerGuardian<V, O> {
    sensor: V,
    controller: O,
    status: Arc<StatusBoard>,
    thresholds: BatteryThresholds,
}

impl<V: VoltageSensor, O: Outbox> PowerGuardian<V, O> {
    /// Creates the task.
    pub fn new(sensor: V, controller: O, status: Arc<StatusBoard>, thresholds: BatteryThresholds) -> Self {
        Self {
            sensor,
            controller,
            status,
            thresholds,
        }
    }

    /// Takes one reading, publishes the percentage, and returns the message
    /// the controller should receive, if any.
    pub fn sample(&mut self) -> Option<ControlMessage> {
        let reading = match self.sensor.read_battery() {
            Ok(reading) => reading,
            Err(e) => {
                log::warn!("Battery read failed: {:?}", e);
                return None;
            }
        };
        let BatteryReading { voltage, percent } = reading;

        match classify(voltage, &self.thresholds) {
            BatteryLevel::Absent => None,
            level => {
                self.status.set_battery_percent(percent);
                log::debug!("Battery: {:.2} V [{}%]", voltage, percent);
                match level {
                    BatteryLevel::Critical => Some(ControlMessage::BatteryCritical { voltage, percent }),
                    BatteryLevel::Low => Some(ControlMessage::BatteryWarning { voltage, percent }),
                    BatteryLevel::Normal | BatteryLevel::Absent => None,
                }
            }
        }
    }

    /// Samples every period until a critical reading is sent or the
    /// controller inbox is gone.
    pub fn run<D: Delay>(mut self, mut delay: D) {
        log::info!("Power guardian started");
        loop {
            if let Some(msg) = self.sample() {
                if self.controller.post(msg).is_err() {
                    log::info!("Controller gone, power guardian stopping");
                    return;
                }
                if msg.is_shutdown() {
                    log::warn!("Battery critical, power guardian stopping");
                    return;
                }
            }
            delay.delay_ms(self.thresholds.sample_period_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockBattery, MockClock};
    use crate::traits::{Clock, SensorError};
    use std::sync::mpsc;

    fn thresholds() -> BatteryThresholds {
        BatteryThresholds::default()
    }

    #[test]
    fn cutoff_is_inclusive() {
        let mut battery = MockBattery::new(3.2);
        assert!(matches!(
            boot_check(&mut battery, &thresholds()),
            BootVerdict::Sleep { flash: true, .. }
        ));
    }

    #[test]
    fn no_flash_below_floor() {
        let mut battery = MockBattery::new(2.9);
        assert!(matches!(
            boot_check(&mut battery, &thresholds()),
            BootVerdict::Sleep { flash: false, .. }
        ));
        let mut battery = MockBattery::new(3.0);
        assert!(matches!(
            boot_check(&mut battery, &thresholds()),
            BootVerdict::Sleep { flash: true, .. }
        ));
    }

    #[test]
    fn bench_power_and_read_failure_proceed() {
        let mut battery = MockBattery::new(0.1);
        assert_eq!(boot_check(&mut battery, &thresholds()), BootVerdict::Proceed);

        let mut battery = MockBattery::new(4.0);
        battery.set_failing(SensorError::Timeout);
        assert_eq!(boot_check(&mut battery, &thresholds()), BootVerdict::Proceed);
    }

    #[test]
    fn warning_band_proceeds_with_flash() {
        let mut battery = MockBattery::new(3.35);
        assert!(matches!(
            boot_check(&mut battery, &thresholds()),
            BootVerdict::ProceedWithWarning(_)
        ));
        let mut battery = MockBattery::new(3.41);
        assert_eq!(boot_check(&mut battery, &thresholds()), BootVerdict::Proceed);
    }

    #[test]
    fn runtime_samples_publish_and_classify() {
        let battery = MockBattery::new(3.9);
        let status = Arc::new(StatusBoard::default());
        let (tx, _rx) = mpsc::channel::<ControlMessage>();
        let mut guardian = PowerGuardian::new(battery.clone(), tx, status.clone(), thresholds());

        assert_eq!(guardian.sample(), None);
        assert_eq!(status.battery_percent(), 75);

        battery.set_voltage(3.3);
        assert!(matches!(
            guardian.sample(),
            Some(ControlMessage::BatteryWarning { percent: 25, .. })
        ));

        battery.set_voltage(0.2);
        assert_eq!(guardian.sample(), None);
        assert_eq!(status.battery_percent(), 25);

        battery.push(Err(SensorError::Conversion));
        assert_eq!(guardian.sample(), None);
    }

    #[test]
    fn run_stops_after_critical() {
        let battery = MockBattery::new(3.8);
        battery.push(Ok(3.8));
        battery.push(Ok(3.1));
        let clock = MockClock::new();
        let (tx, rx) = mpsc::channel::<ControlMessage>();
        PowerGuardian::new(battery.clone(), tx, Arc::new(StatusBoard::default()), thresholds())
            .run(clock.clone());

        assert!(matches!(
            rx.try_recv(),
            Ok(ControlMessage::BatteryCritical { .. })
        ));
        assert_eq!(battery.reads(), 2);
        assert_eq!(clock.now_ms(), 10_000);
    }

    #[test]
    fn run_stops_when_controller_is_gone() {
        let battery = MockBattery::new(3.3);
        let (tx, rx) = mpsc::channel::<ControlMessage>();
        drop(rx);
        PowerGuardian::new(battery.clone(), tx, Arc::new(StatusBoard::default()), thresholds())
            .run(MockClock::new());
        assert_eq!(battery.reads(), 1);
    }
}
