//! The Shutdown Orchestrator: final cleanup and sleep entry.
//!
//! Runs on the controller's thread after the controller hands its outputs
//! over, and performs, in order:
//!
//! 1. actuator coast and indicator clear
//! 2. save the configuration, only when it is dirty
//! 3. blink while the button is still held, so it is not the wake source
//! 4. power down auxiliary peripherals
//! 5. arm the button wake source and enter the lowest-power state
//!
//! [`ShutdownOrchestrator::shutdown`] never returns. If sleep entry fails the
//! task logs the error and parks with the outputs neutral.
//! [`ShutdownOrchestrator::prepare`] runs everything up to sleep entry and
//! [`ShutdownOrchestrator::sleep`] finishes the job.

use crate::actuator::DriveOutputs;
use crate::config::ShutdownTiming;
use crate::store::{ConfigStore, SCHEMA_SIGNATURE};
use crate::traits::{ActuatorDriver, ButtonInput, Delay, Indicator, Rgb, SleepControl};
use crate::wireless::ConfigHandoff;

/// Colour of the waiting-for-release blink.
pub const RELEASE_BLINK_COLOR: Rgb = Rgb::new(128, 0, 128);

/// Colour of the low-battery warning flash.
pub const LOW_BATTERY_COLOR: Rgb = Rgb::new(255, 0, 0);

/// Brightness of both patterns.
pub const PATTERN_BRIGHTNESS: u8 = 20;

/// Park period after a failed sleep entry.
const PARK_MS: u32 = 1000;

/// Flashes `count` times, `ms` on and `ms` off. Ends dark.
pub fn flash_pattern<L: Indicator, D: Delay>(indicator: &mut L, delay: &mut D, color: Rgb, count: u8, ms: u32) {
    for _ in 0..count {
        if let Err(e) = indicator.show(color, PATTERN_BRIGHTNESS) {
            log::warn!("Indicator show failed: {:?}", e);
        }
        delay.delay_ms(ms);
        if let Err(e) = indicator.clear() {
            log::warn!("Indicator clear failed: {:?}", e);
        }
        delay.delay_ms(ms);
    }
}

/// Powers down, arms the wake source and sleeps without a session, e.g.
/// after a critical boot battery check.
pub fn sleep_now<P: SleepControl, D: Delay>(mut sleep: P, mut delay: D) -> ! {
    power_down(&mut sleep);
    enter_sleep(&mut sleep, &mut delay)
}

fn power_down<P: SleepControl>(sleep: &mut P) {
    if let Err(e) = sleep.power_down_peripherals() {
        log::warn!("Peripheral power-down failed: {:?}", e);
    }
    if let Err(e) = sleep.arm_wake_source() {
        log::error!("Wake source arming failed: {:?}", e);
    }
}

fn enter_sleep<P: SleepControl, D: Delay>(sleep: &mut P, delay: &mut D) -> ! {
    log::info!("Entering deep sleep");
    match sleep.enter_lowest_power_state() {
        Ok(never) => match never {},
        Err(e) => log::error!("Sleep entry failed: {:?}, parking", e),
    }
    loop {
        delay.delay_ms(PARK_MS);
    }
}

/// Shutdown sequencing.
pub struct ShutdownOrchestrator<A, L, B, S, P, D> {
    outputs: DriveOutputs<A, L>,
    button: Option<B>,
    config: Option<ConfigHandoff>,
    store: S,
    sleep: P,
    delay: D,
    timing: ShutdownTiming,
}

impl<A, L, B, S, P, D> ShutdownOrchestrator<A, L, B, S, P, D>
where
    A: ActuatorDriver,
    L: Indicator,
    B: ButtonInput,
    S: ConfigStore,
    P: SleepControl,
    D: Delay,
{
    /// Creates the orchestrator. `button` is `None` when the input task did
    /// not hand it back.
    pub fn new(outputs: DriveOutputs<A, L>, button: Option<B>, store: S, sleep: P, delay: D) -> Self {
        Self {
            outputs,
            button,
            config: None,
            store,
            sleep,
            delay,
            timing: ShutdownTiming::default(),
        }
    }

    /// Sets the register values handed over by the wireless interface.
    pub fn with_config(mut self, config: Option<ConfigHandoff>) -> Self {
        self.config = config;
        self
    }

    /// Replaces the pattern timings.
    pub fn with_timing(mut self, timing: ShutdownTiming) -> Self {
        self.timing = timing;
        self
    }

    /// The store, for inspection.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The drive outputs, for inspection.
    pub fn outputs(&self) -> &DriveOutputs<A, L> {
        &self.outputs
    }

    /// Runs every step up to sleep entry.
    pub fn prepare(&mut self) {
        if !self.outputs.neutral() {
            // one retry; the park loop keeps the bridge released afterwards
            self.outputs.neutral();
        }

        match self.config.take() {
            Some(handoff) if handoff.dirty => {
                match self.store.save(&handoff.config, SCHEMA_SIGNATURE) {
                    Ok(()) => log::info!("Configuration saved"),
                    Err(e) => log::error!("Configuration save failed: {}", e),
                }
            }
            Some(_) => log::info!("Configuration unchanged"),
            None => log::warn!("No configuration handed over, nothing saved"),
        }

        if let Some(button) = self.button.as_mut() {
            let mut lit = false;
            let mut waited = false;
            while button.is_pressed() {
                if !waited {
                    log::info!("Waiting for button release");
                    waited = true;
                }
                lit = !lit;
                let result = if lit {
                    self.outputs.indicator.show(RELEASE_BLINK_COLOR, PATTERN_BRIGHTNESS)
                } else {
                    self.outputs.indicator.clear()
                };
                if let Err(e) = result {
                    log::warn!("Indicator blink failed: {:?}", e);
                }
                self.delay.delay_ms(self.timing.release_blink_ms);
            }
            if waited {
                if let Err(e) = self.outputs.indicator.clear() {
                    log::warn!("Indicator clear failed: {:?}", e);
                }
            }
        }

        power_down(&mut self.sleep);
    }

    /// Enters the lowest-power state. Call after [`prepare`](Self::prepare).
    pub fn sleep(mut self) -> ! {
        enter_sleep(&mut self.sleep, &mut self.delay)
    }

    /// Runs the whole sequence. Never returns.
    pub fn shutdown(mut self) -> ! {
        self.prepare();
        self.sleep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{
        IndicatorOutput, MockActuator, MockButton, MockClock, MockIndicator, MockSleep, MockStore, SleepEvent,
    };
    use crate::store::PersistedConfig;
    use crate::traits::Clock;

    type Orchestrator = ShutdownOrchestrator<MockActuator, MockIndicator, MockButton, MockStore, MockSleep, MockClock>;

    fn orchestrator(clock: &MockClock, button: MockButton, store: MockStore, sleep: MockSleep) -> Orchestrator {
        let outputs = DriveOutputs::new(MockActuator::new(clock.clone()), MockIndicator::new(clock.clone()));
        ShutdownOrchestrator::new(outputs, Some(button), store, sleep, clock.clone())
    }

    fn dirty(config: PersistedConfig) -> Option<ConfigHandoff> {
        Some(ConfigHandoff { config, dirty: true })
    }

    #[test]
    fn clean_config_is_not_saved() {
        let clock = MockClock::new();
        let store = MockStore::new();
        let mut o = orchestrator(&clock, MockButton::new(), store.clone(), MockSleep::new()).with_config(Some(
            ConfigHandoff {
                config: PersistedConfig::default(),
                dirty: false,
            },
        ));
        o.prepare();
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn dirty_config_is_saved_with_signature() {
        let clock = MockClock::new();
        let store = MockStore::new();
        let config = PersistedConfig {
            frequency_chz: 150,
            ..PersistedConfig::default()
        };
        let mut o = orchestrator(&clock, MockButton::new(), store.clone(), MockSleep::new()).with_config(dirty(config));
        o.prepare();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.stored(), Some(config));
    }

    #[test]
    fn save_failure_does_not_stop_shutdown() {
        let clock = MockClock::new();
        let store = MockStore::new();
        store.fail_saves(true);
        let sleep = MockSleep::new();
        let mut o = orchestrator(&clock, MockButton::new(), store.clone(), sleep.clone())
            .with_config(dirty(PersistedConfig::default()));
        o.prepare();
        assert_eq!(store.stored(), None);
        assert_eq!(sleep.events(), vec![SleepEvent::PowerDown, SleepEvent::ArmWake]);
    }

    #[test]
    fn blinks_until_release_then_arms_wake() {
        let clock = MockClock::new();
        let button = MockButton::with_timeline(clock.clone(), &[(0, true), (450, false)]);
        let sleep = MockSleep::new();
        let mut o = orchestrator(&clock, button, MockStore::new(), sleep.clone());
        o.prepare();

        assert_eq!(clock.now_ms(), 500);
        let on: Vec<u64> = o.outputs().indicator.lit_at();
        assert_eq!(on, vec![0, 200, 400]);
        assert_eq!(o.outputs().indicator.output(), IndicatorOutput::Off);
        assert!(o.outputs().actuator.is_neutral());
        assert_eq!(sleep.events(), vec![SleepEvent::PowerDown, SleepEvent::ArmWake]);
    }

    #[test]
    fn indicator_failures_during_release_wait_do_not_block_sleep() {
        let clock = MockClock::new();
        let button = MockButton::with_timeline(clock.clone(), &[(0, true), (450, false)]);
        let sleep = MockSleep::new();
        let mut o = orchestrator(&clock, button, MockStore::new(), sleep.clone());
        o.outputs.indicator.fail_next(u32::MAX);
        o.prepare();

        assert_eq!(clock.now_ms(), 500);
        assert!(o.outputs().indicator.events().is_empty());
        assert_eq!(sleep.events(), vec![SleepEvent::PowerDown, SleepEvent::ArmWake]);
    }

    #[test]
    fn outputs_go_neutral_first() {
        let clock = MockClock::new();
        let mut o = orchestrator(&clock, MockButton::new(), MockStore::new(), MockSleep::new());
        o.outputs.actuator.fail_next(1);
        o.prepare();
        assert!(o.outputs().actuator.is_neutral());
    }

    #[test]
    fn flash_pattern_ends_dark() {
        let mut clock = MockClock::new();
        let mut indicator = MockIndicator::new(clock.clone());
        flash_pattern(&mut indicator, &mut clock, LOW_BATTERY_COLOR, 3, 200);
        assert_eq!(indicator.lit_at(), vec![0, 400, 800]);
        assert_eq!(clock.now_ms(), 1200);
        assert!(!indicator.is_lit());
    }
}
