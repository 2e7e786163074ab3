//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for every hardware and wireless trait,
//! so the state machines run on a desktop against a virtual clock.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockClock`] | [`Clock`], [`Delay`] | Shared virtual time; delays advance it |
//! | [`MockActuator`] | [`ActuatorDriver`] | Timestamped output log |
//! | [`MockIndicator`] | [`Indicator`] | Timestamped output log |
//! | [`MockBackEmf`] | [`BackEmfSensor`] | Scripted readings |
//! | [`MockBattery`] | [`VoltageSensor`] | Scripted voltages, settable from another thread |
//! | [`MockButton`] | [`ButtonInput`] | Shared level or a timed edge script |
//! | [`MockSleep`] | [`SleepControl`] | Records the sleep sequence |
//! | [`MockTransport`] | [`WirelessTransport`] | Queued requests, captured replies |
//! | [`MockStore`] | [`ConfigStore`] | In-memory encoded record |
//! | [`ScriptedInbox`] | [`Inbox`] | Messages delivered at virtual times |
//! | [`StdClock`], [`StdDelay`] | [`Clock`], [`Delay`] | Wall-clock time for threaded tests |
//!
//! Mocks that a test needs to inspect after handing them to a task are
//! `Clone` and share their state; the clone kept by the test sees every call
//! the task makes.
//!
//! # Example
//!
//! ```rust
//! use bilateral_haptic::hal::{ActuatorOutput, MockActuator, MockClock};
//! use bilateral_haptic::traits::{ActuatorDriver, Delay};
//!
//! let mut clock = MockClock::new();
//! let mut actuator = MockActuator::new(clock.clone());
//! let observer = actuator.clone();
//!
//! actuator.drive_forward(75).unwrap();
//! clock.delay_ms(250);
//! actuator.coast().unwrap();
//!
//! assert_eq!(
//!     observer.events(),
//!     vec![(0, ActuatorOutput::Forward(75)), (250, ActuatorOutput::Coast)]
//! );
//! ```
//!
//! [`Clock`]: crate::traits::Clock
//! [`Delay`]: crate::traits::Delay
//! [`ActuatorDriver`]: crate::traits::ActuatorDriver
//! [`Indicator`]: crate::traits::Indicator
//! [`BackEmfSensor`]: crate::traits::BackEmfSensor
//! [`VoltageSensor`]: crate::traits::VoltageSensor
//! [`ButtonInput`]: crate::traits::ButtonInput
//! [`SleepControl`]: crate::traits::SleepControl
//! [`WirelessTransport`]: crate::traits::WirelessTransport
//! [`ConfigStore`]: crate::store::ConfigStore
//! [`Inbox`]: crate::messages::Inbox

use crate::config::BatteryThresholds;
use crate::messages::{ControlMessage, Inbox};
use crate::traits::{
    ActuatorDriver, BackEmfSensor, BatteryReading, ButtonInput, Clock, Delay, Indicator,
    PowerError, RegisterOp, RegisterReply, Rgb, SensorError, SleepControl, VoltageSensor,
    WirelessTransport,
};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicking test thread must not hide the state from the others
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Time
// ============================================================================

/// Shared virtual clock.
///
/// Clones share the same time. As a [`Delay`], it advances instead of
/// blocking.
///
/// ```rust
/// use bilateral_haptic::hal::MockClock;
/// use bilateral_haptic::traits::Clock;
///
/// let clock = MockClock::new();
/// let other = clock.clone();
/// clock.set(1000);
/// other.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    now_ms: Arc<AtomicU64>,
}

impl MockClock {
    /// Creates a clock at 0 ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jumps to `ms`.
    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    /// Moves time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

impl Delay for MockClock {
    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

/// Wall-clock time since construction.
#[derive(Clone, Copy, Debug)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    /// Starts counting from now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Blocking delay on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// What the H-bridge is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ActuatorOutput {
    /// Driven forward at the intensity.
    Forward(u8),
    /// Driven in reverse at the intensity.
    Reverse(u8),
    /// Both legs off.
    #[default]
    Coast,
}

/// Recording actuator.
///
/// Every call is logged with the clock time, including repeated coasts.
/// `fail_next(n)` makes the next `n` calls fail without changing the output.
#[derive(Clone, Debug)]
pub struct MockActuator {
    clock: MockClock,
    events: Arc<Mutex<Vec<(u64, ActuatorOutput)>>>,
    failures: Arc<AtomicU32>,
}

impl MockActuator {
    /// Creates a coasting actuator that timestamps with `clock`.
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            events: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Makes the next `count` calls return an error.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Current output.
    pub fn output(&self) -> ActuatorOutput {
        lock(&self.events).last().map(|&(_, o)| o).unwrap_or_default()
    }

    /// Returns `true` while coasting.
    pub fn is_neutral(&self) -> bool {
        self.output() == ActuatorOutput::Coast
    }

    /// Every accepted call, oldest first.
    pub fn events(&self) -> Vec<(u64, ActuatorOutput)> {
        lock(&self.events).clone()
    }

    /// Accepted drive calls (forward or reverse), oldest first.
    pub fn drives(&self) -> Vec<(u64, ActuatorOutput)> {
        self.events()
            .into_iter()
            .filter(|(_, o)| *o != ActuatorOutput::Coast)
            .collect()
    }

    fn record(&self, output: ActuatorOutput) -> Result<(), ()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(());
        }
        lock(&self.events).push((self.clock.now_ms(), output));
        Ok(())
    }
}

impl ActuatorDriver for MockActuator {
    type Error = ();

    fn drive_forward(&mut self, intensity_percent: u8) -> Result<(), ()> {
        self.record(ActuatorOutput::Forward(intensity_percent))
    }

    fn drive_reverse(&mut self, intensity_percent: u8) -> Result<(), ()> {
        self.record(ActuatorOutput::Reverse(intensity_percent))
    }

    fn coast(&mut self) -> Result<(), ()> {
        self.record(ActuatorOutput::Coast)
    }
}

/// What the indicator is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IndicatorOutput {
    /// Dark.
    #[default]
    Off,
    /// Lit with a colour at a brightness.
    On(Rgb, u8),
}

/// Recording indicator. `fail_next(n)` works as on [`MockActuator`].
#[derive(Clone, Debug)]
pub struct MockIndicator {
    clock: MockClock,
    events: Arc<Mutex<Vec<(u64, IndicatorOutput)>>>,
    failures: Arc<AtomicU32>,
}

impl MockIndicator {
    /// Creates a dark indicator that timestamps with `clock`.
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            events: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Makes the next `count` calls return an error.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Current output.
    pub fn output(&self) -> IndicatorOutput {
        lock(&self.events).last().map(|&(_, o)| o).unwrap_or_default()
    }

    /// Returns `true` while lit.
    pub fn is_lit(&self) -> bool {
        matches!(self.output(), IndicatorOutput::On(..))
    }

    /// Every call, oldest first.
    pub fn events(&self) -> Vec<(u64, IndicatorOutput)> {
        lock(&self.events).clone()
    }

    /// Times the indicator was switched on.
    pub fn lit_at(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter(|(_, o)| matches!(o, IndicatorOutput::On(..)))
            .map(|(t, _)| t)
            .collect()
    }

    fn record(&self, output: IndicatorOutput) -> Result<(), ()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(());
        }
        lock(&self.events).push((self.clock.now_ms(), output));
        Ok(())
    }
}

impl Indicator for MockIndicator {
    type Error = ();

    fn show(&mut self, color: Rgb, brightness_percent: u8) -> Result<(), ()> {
        self.record(IndicatorOutput::On(color, brightness_percent))
    }

    fn clear(&mut self) -> Result<(), ()> {
        self.record(IndicatorOutput::Off)
    }
}

// ============================================================================
// Sensors
// ============================================================================

/// Back-EMF sensor returning scripted readings, then a fallback value.
///
/// ```rust
/// use bilateral_haptic::hal::MockBackEmf;
/// use bilateral_haptic::traits::{BackEmfSensor, SensorError};
///
/// let mut sensor = MockBackEmf::new(-200)
///     .with_reading(Ok(1200))
///     .with_reading(Err(SensorError::Timeout));
///
/// assert_eq!(sensor.read_millivolts(), Ok(1200));
/// assert_eq!(sensor.read_millivolts(), Err(SensorError::Timeout));
/// assert_eq!(sensor.read_millivolts(), Ok(-200));
/// assert_eq!(sensor.reads, 3);
/// ```
#[derive(Debug)]
pub struct MockBackEmf {
    /// Readings returned first, in order.
    pub script: VecDeque<Result<i32, SensorError>>,
    /// Reading once the script is exhausted.
    pub fallback: Result<i32, SensorError>,
    /// Number of reads so far.
    pub reads: usize,
}

impl MockBackEmf {
    /// Creates a sensor that always reads `millivolts`.
    pub fn new(millivolts: i32) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Ok(millivolts),
            reads: 0,
        }
    }

    /// Creates a sensor whose every read fails.
    pub fn failing(error: SensorError) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Err(error),
            reads: 0,
        }
    }

    /// Appends a scripted reading.
    pub fn with_reading(mut self, reading: Result<i32, SensorError>) -> Self {
        self.script.push_back(reading);
        self
    }
}

impl BackEmfSensor for MockBackEmf {
    type Error = SensorError;

    fn read_millivolts(&mut self) -> Result<i32, SensorError> {
        self.reads += 1;
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

#[derive(Debug)]
struct BatteryScript {
    queued: VecDeque<Result<f32, SensorError>>,
    level: Result<f32, SensorError>,
    reads: usize,
}

/// Battery sensor with a shared, settable voltage.
///
/// Queued readings are returned first; afterwards the current level is
/// returned on every read. Percent follows [`BatteryThresholds::percent`].
#[derive(Clone, Debug)]
pub struct MockBattery {
    inner: Arc<Mutex<BatteryScript>>,
    thresholds: BatteryThresholds,
}

impl MockBattery {
    /// Creates a battery reading `voltage`.
    pub fn new(voltage: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BatteryScript {
                queued: VecDeque::new(),
                level: Ok(voltage),
                reads: 0,
            })),
            thresholds: BatteryThresholds::default(),
        }
    }

    /// Changes the steady-state voltage.
    pub fn set_voltage(&self, voltage: f32) {
        lock(&self.inner).level = Ok(voltage);
    }

    /// Makes every later read fail (after the queue drains).
    pub fn set_failing(&self, error: SensorError) {
        lock(&self.inner).level = Err(error);
    }

    /// Queues one reading.
    pub fn push(&self, reading: Result<f32, SensorError>) {
        lock(&self.inner).queued.push_back(reading);
    }

    /// Number of reads so far.
    pub fn reads(&self) -> usize {
        lock(&self.inner).reads
    }
}

impl VoltageSensor for MockBattery {
    type Error = SensorError;

    fn read_battery(&mut self) -> Result<BatteryReading, SensorError> {
        let mut inner = lock(&self.inner);
        inner.reads += 1;
        let reading = inner.queued.pop_front().unwrap_or(inner.level);
        reading.map(|voltage| BatteryReading {
            voltage,
            percent: self.thresholds.percent(voltage),
        })
    }
}

// ============================================================================
// Button
// ============================================================================

#[derive(Clone, Debug)]
enum ButtonSource {
    Level(Arc<AtomicBool>),
    Timeline {
        clock: MockClock,
        edges: Arc<[(u64, bool)]>,
    },
}

/// Button with a shared level, or a script of `(time, pressed)` edges.
///
/// ```rust
/// use bilateral_haptic::hal::{MockButton, MockClock};
/// use bilateral_haptic::traits::ButtonInput;
///
/// let clock = MockClock::new();
/// let mut button = MockButton::with_timeline(clock.clone(), &[(100, true), (400, false)]);
///
/// assert!(!button.is_pressed());
/// clock.set(100);
/// assert!(button.is_pressed());
/// clock.set(400);
/// assert!(!button.is_pressed());
/// ```
#[derive(Clone, Debug)]
pub struct MockButton {
    source: ButtonSource,
    samples: Arc<AtomicU32>,
}

impl MockButton {
    /// Creates a released button controlled by [`press`](Self::press) and
    /// [`release`](Self::release).
    pub fn new() -> Self {
        Self {
            source: ButtonSource::Level(Arc::new(AtomicBool::new(false))),
            samples: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Creates a button that follows `edges` on `clock`. Released before the
    /// first edge.
    pub fn with_timeline(clock: MockClock, edges: &[(u64, bool)]) -> Self {
        Self {
            source: ButtonSource::Timeline {
                clock,
                edges: edges.into(),
            },
            samples: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Presses a level button. No effect on a timeline button.
    pub fn press(&self) {
        if let ButtonSource::Level(level) = &self.source {
            level.store(true, Ordering::SeqCst);
        }
    }

    /// Releases a level button.
    pub fn release(&self) {
        if let ButtonSource::Level(level) = &self.source {
            level.store(false, Ordering::SeqCst);
        }
    }

    /// Number of `is_pressed` calls so far.
    pub fn samples(&self) -> u32 {
        self.samples.load(Ordering::SeqCst)
    }
}

impl Default for MockButton {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonInput for MockButton {
    fn is_pressed(&mut self) -> bool {
        self.samples.fetch_add(1, Ordering::SeqCst);
        match &self.source {
            ButtonSource::Level(level) => level.load(Ordering::SeqCst),
            ButtonSource::Timeline { clock, edges } => {
                let now = clock.now_ms();
                edges
                    .iter()
                    .take_while(|(at, _)| *at <= now)
                    .last()
                    .map(|&(_, pressed)| pressed)
                    .unwrap_or(false)
            }
        }
    }
}

// ============================================================================
// Sleep
// ============================================================================

/// One step of the sleep sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepEvent {
    /// `power_down_peripherals` was called.
    PowerDown,
    /// `arm_wake_source` was called.
    ArmWake,
    /// `enter_lowest_power_state` was called.
    EnterSleep,
}

/// Records the sleep sequence. Sleep entry always fails so the caller's
/// park path runs.
#[derive(Clone, Debug, Default)]
pub struct MockSleep {
    events: Arc<Mutex<Vec<SleepEvent>>>,
}

impl MockSleep {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls so far, oldest first.
    pub fn events(&self) -> Vec<SleepEvent> {
        lock(&self.events).clone()
    }

    /// Returns `true` once sleep entry was attempted.
    pub fn entered(&self) -> bool {
        self.events().contains(&SleepEvent::EnterSleep)
    }
}

impl SleepControl for MockSleep {
    type Error = PowerError;

    fn power_down_peripherals(&mut self) -> Result<(), PowerError> {
        lock(&self.events).push(SleepEvent::PowerDown);
        Ok(())
    }

    fn arm_wake_source(&mut self) -> Result<(), PowerError> {
        lock(&self.events).push(SleepEvent::ArmWake);
        Ok(())
    }

    fn enter_lowest_power_state(&mut self) -> Result<Infallible, PowerError> {
        lock(&self.events).push(SleepEvent::EnterSleep);
        Err(PowerError::SleepRejected)
    }
}

// ============================================================================
// Wireless
// ============================================================================

#[derive(Debug, Default)]
struct TransportState {
    requests: VecDeque<RegisterOp>,
    replies: Vec<RegisterReply>,
    advertising: bool,
    starts: u32,
    stops: u32,
}

/// Register transport with a request queue and captured replies.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    /// Creates a quiet transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a client request.
    pub fn push_request(&self, op: RegisterOp) {
        lock(&self.inner).requests.push_back(op);
    }

    /// Replies sent so far.
    pub fn replies(&self) -> Vec<RegisterReply> {
        lock(&self.inner).replies.clone()
    }

    /// Returns `true` while advertising.
    pub fn is_advertising(&self) -> bool {
        lock(&self.inner).advertising
    }

    /// Number of `start_advertising` calls.
    pub fn start_count(&self) -> u32 {
        lock(&self.inner).starts
    }

    /// Number of `stop_advertising` calls.
    pub fn stop_count(&self) -> u32 {
        lock(&self.inner).stops
    }
}

impl WirelessTransport for MockTransport {
    type Error = ();

    fn start_advertising(&mut self) -> Result<(), ()> {
        let mut inner = lock(&self.inner);
        inner.advertising = true;
        inner.starts += 1;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), ()> {
        let mut inner = lock(&self.inner);
        inner.advertising = false;
        inner.stops += 1;
        Ok(())
    }

    fn poll_request(&mut self) -> Option<RegisterOp> {
        lock(&self.inner).requests.pop_front()
    }

    fn respond(&mut self, reply: RegisterReply) {
        lock(&self.inner).replies.push(reply);
    }
}

// ============================================================================
// Config Store
// ============================================================================

#[cfg(feature = "serde-json-core")]
mod store {
    use super::lock;
    use crate::store::{
        decode_record, encode_record, ConfigStore, PersistedConfig, StoreError, RECORD_CAPACITY,
        SCHEMA_SIGNATURE,
    };
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct StoreState {
        bytes: Option<Vec<u8>>,
        saves: u32,
        fail_saves: bool,
    }

    /// In-memory store holding one encoded record.
    ///
    /// ```rust
    /// use bilateral_haptic::hal::MockStore;
    /// use bilateral_haptic::store::{ConfigStore, PersistedConfig, SCHEMA_SIGNATURE};
    ///
    /// let mut store = MockStore::new();
    /// assert_eq!(store.load(SCHEMA_SIGNATURE), None);
    ///
    /// let config = PersistedConfig { duty_percent: 30, ..PersistedConfig::default() };
    /// store.save(&config, SCHEMA_SIGNATURE).unwrap();
    /// assert_eq!(store.load(SCHEMA_SIGNATURE), Some(config));
    /// assert_eq!(store.load(SCHEMA_SIGNATURE ^ 1), None);
    /// ```
    #[derive(Clone, Debug, Default)]
    pub struct MockStore {
        inner: Arc<Mutex<StoreState>>,
    }

    impl MockStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a store already holding `config` with the current
        /// signature.
        pub fn with_config(config: &PersistedConfig) -> Self {
            let store = Self::new();
            let mut buf = [0u8; RECORD_CAPACITY];
            if let Ok(len) = encode_record(config, SCHEMA_SIGNATURE, &mut buf) {
                store.inject_bytes(&buf[..len]);
            }
            store
        }

        /// Replaces the stored bytes verbatim.
        pub fn inject_bytes(&self, bytes: &[u8]) {
            lock(&self.inner).bytes = Some(bytes.to_vec());
        }

        /// Raw stored bytes.
        pub fn bytes(&self) -> Option<Vec<u8>> {
            lock(&self.inner).bytes.clone()
        }

        /// Decodes the stored record with the current signature.
        pub fn stored(&self) -> Option<PersistedConfig> {
            self.bytes()
                .and_then(|bytes| decode_record(&bytes, SCHEMA_SIGNATURE))
        }

        /// Number of successful saves.
        pub fn save_count(&self) -> u32 {
            lock(&self.inner).saves
        }

        /// Makes every later save fail.
        pub fn fail_saves(&self, fail: bool) {
            lock(&self.inner).fail_saves = fail;
        }
    }

    impl ConfigStore for MockStore {
        fn load(&mut self, signature: u32) -> Option<PersistedConfig> {
            let bytes = lock(&self.inner).bytes.clone()?;
            decode_record(&bytes, signature)
        }

        fn save(&mut self, config: &PersistedConfig, signature: u32) -> Result<(), StoreError> {
            let mut inner = lock(&self.inner);
            if inner.fail_saves {
                return Err(StoreError::Backend(-1));
            }
            let mut buf = [0u8; RECORD_CAPACITY];
            let len = encode_record(config, signature, &mut buf)?;
            inner.bytes = Some(buf[..len].to_vec());
            inner.saves += 1;
            Ok(())
        }
    }
}

#[cfg(feature = "serde-json-core")]
pub use store::MockStore;

// ============================================================================
// Inbox
// ============================================================================

/// Inbox that delivers messages at scripted virtual times.
///
/// `recv_timeout_ms` advances the shared clock: to the next message's time
/// when it falls inside the timeout, otherwise by the full timeout. A task
/// driven by this inbox runs through hours of virtual time instantly.
///
/// ```rust
/// use bilateral_haptic::hal::{MockClock, ScriptedInbox};
/// use bilateral_haptic::traits::Clock;
/// use bilateral_haptic::{ControlMessage, Inbox};
///
/// let clock = MockClock::new();
/// let mut inbox = ScriptedInbox::new(clock.clone())
///     .with_message(120, ControlMessage::EmergencyShutdown);
///
/// assert_eq!(inbox.recv_timeout_ms(50), None);
/// assert_eq!(clock.now_ms(), 50);
/// assert_eq!(inbox.recv_timeout_ms(100), Some(ControlMessage::EmergencyShutdown));
/// assert_eq!(clock.now_ms(), 120);
/// ```
#[derive(Debug)]
pub struct ScriptedInbox {
    clock: MockClock,
    script: VecDeque<(u64, ControlMessage)>,
}

impl ScriptedInbox {
    /// Creates an empty inbox on `clock`.
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            script: VecDeque::new(),
        }
    }

    /// Schedules `msg` for delivery at `at_ms`. Messages must be added in
    /// time order.
    pub fn with_message(mut self, at_ms: u64, msg: ControlMessage) -> Self {
        self.script.push_back((at_ms, msg));
        self
    }

    /// Messages not yet delivered.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Inbox for ScriptedInbox {
    fn try_recv_message(&mut self) -> Option<ControlMessage> {
        match self.script.front() {
            Some(&(at, _)) if at <= self.clock.now_ms() => self.script.pop_front().map(|(_, m)| m),
            _ => None,
        }
    }

    fn recv_timeout_ms(&mut self, timeout_ms: u32) -> Option<ControlMessage> {
        let now = self.clock.now_ms();
        let deadline = now + u64::from(timeout_ms);
        match self.script.front() {
            Some(&(at, _)) if at <= deadline => {
                if at > now {
                    self.clock.set(at);
                }
                self.script.pop_front().map(|(_, m)| m)
            }
            _ => {
                self.clock.set(deadline);
                None
            }
        }
    }
}
