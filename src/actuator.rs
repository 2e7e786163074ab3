//! The Actuator Controller: bilateral alternation with back-EMF sampling.
//!
//! This module provides [`ActuatorController`], the only task that touches
//! the drive outputs. It runs the forward/reverse alternation of the active
//! [`Mode`], characterizes the actuator during the indication window, and is
//! the sole enforcer of the safe state.
//!
//! # State Machine
//!
//! ```text
//! AwaitingInstruction ─► Drive(FWD) ─┬─────────────────────────────┬─► CoastRemaining(FWD)
//!        ▲                           └─► SampleImmediate ─► SampleSettled ┘          │
//!        │                                                                           ▼
//!        └── CoastRemaining(REV) ◄─┬─────────────────────────────┬─◄──────── Drive(REV)
//!                                  └─◄ SampleSettled ◄─ SampleImmediate ◄┘
//!
//! any state ──► ShuttingDown (terminal)
//! ```
//!
//! Every wait is sliced into quanta of [`ControllerTiming::quantum_ms`]. A
//! shutdown-class message, a mode change, or a tuning change while custom
//! mode runs ends the wait early; the outputs go neutral and the controller
//! returns to `AwaitingInstruction`, where the inbox is drained with the
//! rules of [`PendingMessages`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::{mpsc, Arc};
//! use bilateral_haptic::actuator::{ActuatorController, DriveOutputs, Peers};
//! use bilateral_haptic::hal::{MockActuator, MockBackEmf, MockClock, MockIndicator, ScriptedInbox};
//! use bilateral_haptic::status::StatusBoard;
//! use bilateral_haptic::{ControlMessage, ShutdownReason};
//!
//! let clock = MockClock::new();
//! let outputs = DriveOutputs::new(MockActuator::new(clock.clone()), MockIndicator::new(clock.clone()));
//! let inbox = ScriptedInbox::new(clock.clone()).with_message(2_000, ControlMessage::EmergencyShutdown);
//! let (to_input, _input) = mpsc::channel::<ControlMessage>();
//! let (to_wireless, _wireless) = mpsc::channel::<ControlMessage>();
//! let peers = Peers::new(to_input, to_wireless, Arc::new(StatusBoard::default()));
//!
//! let controller = ActuatorController::new(outputs, MockBackEmf::new(800), inbox, peers, clock);
//! let handoff = controller.run();
//!
//! assert_eq!(handoff.reason, ShutdownReason::Emergency);
//! assert!(handoff.outputs.actuator.is_neutral());
//! ```

use crate::backemf::{log_sample, BackEmfSample, Reading, SampleSink};
use crate::config::ControllerTiming;
use crate::messages::{ControlMessage, Inbox, LiveTuning, Outbox, PALETTE};
use crate::mode::{Mode, ModeId};
use crate::priority::{Drained, MessageClass, PendingMessages, ShutdownReason};
use crate::status::StatusBoard;
use crate::traits::{ActuatorDriver, BackEmfSensor, Clock, Direction, Indicator, Rgb};
use alloc::sync::Arc;

// ============================================================================
// Outputs
// ============================================================================

/// The drive outputs, owned by the controller and then by the orchestrator.
#[derive(Debug)]
pub struct DriveOutputs<A, L> {
    /// H-bridge.
    pub actuator: A,
    /// RGB indicator.
    pub indicator: L,
}

impl<A: ActuatorDriver, L: Indicator> DriveOutputs<A, L> {
    /// Bundles the outputs.
    pub fn new(actuator: A, indicator: L) -> Self {
        Self {
            actuator,
            indicator,
        }
    }

    /// Coasts the actuator and clears the indicator.
    ///
    /// Idempotent. Returns `false` if the coast failed; indicator errors are
    /// logged only.
    pub fn neutral(&mut self) -> bool {
        let coasted = match self.actuator.coast() {
            Ok(()) => true,
            Err(e) => {
                log::error!("Actuator coast failed: {:?}", e);
                false
            }
        };
        if let Err(e) = self.indicator.clear() {
            log::warn!("Indicator clear failed: {:?}", e);
        }
        coasted
    }
}

/// What the controller hands over when it stops.
#[derive(Debug)]
pub struct Handoff<A, L> {
    /// Drive outputs, already neutral.
    pub outputs: DriveOutputs<A, L>,
    /// Why the session ended.
    pub reason: ShutdownReason,
}

/// Outboxes to the other tasks plus the shared status board.
pub struct Peers<O> {
    /// Input Handler inbox.
    pub input: O,
    /// Wireless Interface inbox.
    pub wireless: O,
    /// Status published for the other tasks.
    pub status: Arc<StatusBoard>,
}

impl<O: Outbox> Peers<O> {
    /// Bundles the peer links.
    pub fn new(input: O, wireless: O, status: Arc<StatusBoard>) -> Self {
        Self {
            input,
            wireless,
            status,
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Controller state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControllerState {
    /// Draining the inbox and planning the next cycle.
    AwaitingInstruction,
    /// Driving one half-cycle.
    Drive(Direction),
    /// Bridge just released; taking the immediate reading.
    SampleImmediate(Direction),
    /// Waiting out the settle delay, then taking the settled reading.
    SampleSettled(Direction),
    /// Coasting for the rest of the half-cycle.
    CoastRemaining {
        /// Half-cycle polarity.
        direction: Direction,
        /// Remaining coast time.
        ms: u32,
    },
    /// Terminal.
    ShuttingDown(ShutdownReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Wait {
    Completed,
    Interrupted,
}

/// Controller-private session bookkeeping.
#[derive(Clone, Copy, Debug)]
struct DeviceSession {
    started_ms: u64,
    indication_started_ms: u64,
    last_minute_warned: bool,
}

#[derive(Clone, Copy, Debug)]
struct PartialSample {
    direction: Direction,
    drive_started_ms: u64,
    drive: Reading,
    immediate: Option<Reading>,
}

/// Catalog indicator colours, as palette entries.
const fn catalog_palette_index(id: ModeId) -> Option<usize> {
    match id {
        ModeId::OneHzHalf => Some(0),
        ModeId::OneHzQuarter => Some(4),
        ModeId::HalfHzHalf => Some(8),
        ModeId::HalfHzQuarter => Some(2),
        ModeId::Custom => None,
    }
}

// ============================================================================
// Controller
// ============================================================================

/// The Actuator Controller task.
///
/// # Type Parameters
///
/// - `A`: H-bridge ([`ActuatorDriver`])
/// - `L`: indicator ([`Indicator`])
/// - `E`: back-EMF channel ([`BackEmfSensor`])
/// - `I`: this task's inbox ([`Inbox`])
/// - `O`: outbox type of the peers ([`Outbox`])
/// - `C`: time source ([`Clock`])
/// - `S`: extra consumer for completed samples ([`SampleSink`])
pub struct ActuatorController<A, L, E, I, O, C, S = ()> {
    outputs: DriveOutputs<A, L>,
    sensor: E,
    inbox: I,
    peers: Peers<O>,
    clock: C,
    sink: S,
    timing: ControllerTiming,
    tuning: LiveTuning,
    mode: Mode,
    state: ControllerState,
    pending: PendingMessages,
    session: DeviceSession,
    sampling: bool,
    engaged: bool,
    triple: Option<PartialSample>,
}

impl<A, L, E, I, O, C> ActuatorController<A, L, E, I, O, C, ()>
where
    A: ActuatorDriver,
    L: Indicator,
    E: BackEmfSensor,
    I: Inbox,
    O: Outbox,
    C: Clock,
{
    /// Creates a controller running the first catalog mode with default
    /// tuning and timing.
    pub fn new(outputs: DriveOutputs<A, L>, sensor: E, inbox: I, peers: Peers<O>, clock: C) -> Self {
        Self {
            outputs,
            sensor,
            inbox,
            peers,
            clock,
            sink: (),
            timing: ControllerTiming::default(),
            tuning: LiveTuning::default(),
            mode: Mode::default(),
            state: ControllerState::AwaitingInstruction,
            pending: PendingMessages::new(),
            session: DeviceSession {
                started_ms: 0,
                indication_started_ms: 0,
                last_minute_warned: false,
            },
            sampling: false,
            engaged: false,
            triple: None,
        }
    }
}

impl<A, L, E, I, O, C, S> ActuatorController<A, L, E, I, O, C, S>
where
    A: ActuatorDriver,
    L: Indicator,
    E: BackEmfSensor,
    I: Inbox,
    O: Outbox,
    C: Clock,
    S: SampleSink,
{
    /// Replaces the timing constants.
    pub fn with_timing(mut self, timing: ControllerTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the tuning restored from the Config Store.
    pub fn with_tuning(mut self, tuning: LiveTuning) -> Self {
        self.tuning = tuning;
        if self.mode.is_custom() {
            self.mode = tuning.custom.to_mode();
        }
        self
    }

    /// Sets the starting mode.
    pub fn with_mode(mut self, id: ModeId) -> Self {
        self.mode = crate::mode::resolve(id, &self.tuning.custom);
        self
    }

    /// Adds a second consumer for completed back-EMF samples.
    pub fn with_sample_sink<S2: SampleSink>(self, sink: S2) -> ActuatorController<A, L, E, I, O, C, S2> {
        ActuatorController {
            outputs: self.outputs,
            sensor: self.sensor,
            inbox: self.inbox,
            peers: self.peers,
            clock: self.clock,
            sink,
            timing: self.timing,
            tuning: self.tuning,
            mode: self.mode,
            state: self.state,
            pending: self.pending,
            session: self.session,
            sampling: self.sampling,
            engaged: self.engaged,
            triple: self.triple,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Active profile.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Runs the session to completion and hands the outputs over.
    pub fn run(mut self) -> Handoff<A, L> {
        self.begin_session();
        loop {
            if let ControllerState::ShuttingDown(reason) = self.state {
                return self.finish(reason);
            }
            self.state = self.step();
        }
    }

    fn begin_session(&mut self) {
        let now = self.clock.now_ms();
        self.session = DeviceSession {
            started_ms: now,
            indication_started_ms: now,
            last_minute_warned: false,
        };
        self.peers.status.set_active_mode(self.mode.id);
        self.peers.status.set_session_elapsed_s(0);
        self.state = ControllerState::AwaitingInstruction;
        log::info!("Controller started: {}", self.mode);
    }

    fn step(&mut self) -> ControllerState {
        match self.state {
            ControllerState::AwaitingInstruction => self.await_instruction(),
            ControllerState::Drive(direction) => self.drive(direction),
            ControllerState::SampleImmediate(direction) => self.sample_immediate(direction),
            ControllerState::SampleSettled(direction) => self.sample_settled(direction),
            ControllerState::CoastRemaining { direction, ms } => self.coast_remaining(direction, ms),
            terminal @ ControllerState::ShuttingDown(_) => terminal,
        }
    }

    fn await_instruction(&mut self) -> ControllerState {
        while let Some(msg) = self.inbox.try_recv_message() {
            self.pending.absorb(msg);
        }
        let drained = self.pending.take();
        if let Some(reason) = drained.shutdown {
            log::info!("Shutdown requested: {:?}", reason);
            return ControllerState::ShuttingDown(reason);
        }

        let now = self.clock.now_ms();
        self.apply(drained, now);

        let elapsed = now.saturating_sub(self.session.started_ms);
        self.peers
            .status
            .set_session_elapsed_s((elapsed / 1000) as u32);
        let duration_ms = u64::from(self.tuning.session_duration_s) * 1000;
        if elapsed >= duration_ms {
            log::info!("Session complete ({} s)", self.tuning.session_duration_s);
            return ControllerState::ShuttingDown(ShutdownReason::SessionTimeout);
        }

        let in_last_minute = duration_ms - elapsed <= u64::from(self.timing.last_minute_ms);
        if in_last_minute && !self.session.last_minute_warned {
            log::info!("Last minute of session");
        }
        self.session.last_minute_warned = in_last_minute;

        self.sampling = self.in_indication_window(now);
        ControllerState::Drive(Direction::Forward)
    }

    fn apply(&mut self, drained: Drained, now: u64) {
        if drained.foreign > 0 {
            log::warn!("Ignored {} message(s) addressed to another task", drained.foreign);
        }
        if let Some(warning) = drained.warning {
            log::warn!(
                "Battery low: {:.2} V ({}%)",
                warning.voltage,
                warning.percent
            );
        }
        if let Some(tuning) = drained.tuning {
            self.tuning = tuning;
            if self.mode.is_custom() {
                self.mode = tuning.custom.to_mode();
                log::info!("Custom profile updated: {}", self.mode);
            }
        }
        if let Some(requested) = drained.mode {
            if drained.coalesced_modes > 0 {
                log::debug!("Coalesced {} mode change(s)", drained.coalesced_modes);
            }
            self.switch_mode(requested, now);
        }
    }

    fn switch_mode(&mut self, requested: Mode, now: u64) {
        let mode = if requested.is_custom() {
            self.tuning.custom.to_mode()
        } else {
            requested
        };
        if let Err(e) = mode.validate() {
            log::warn!("Rejected mode {}: {}", mode.name, e);
            return;
        }
        if mode.id != self.mode.id {
            self.session.indication_started_ms = now;
            log::info!("Mode: {}", mode);
        }
        self.mode = mode;
        self.peers.status.set_active_mode(mode.id);
    }

    fn drive(&mut self, direction: Direction) -> ControllerState {
        let started = self.clock.now_ms();
        if let Err(e) = self.outputs.actuator.drive(direction, self.mode.intensity_percent) {
            log::error!("Actuator drive failed: {:?}", e);
        }
        self.engaged = true;
        if self.indicator_on(started) {
            let (color, brightness) = self.indicator_color();
            if let Err(e) = self.outputs.indicator.show(color, brightness) {
                log::warn!("Indicator show failed: {:?}", e);
            }
        }

        let active = self.mode.active_ms;
        let coast = ControllerState::CoastRemaining {
            direction,
            ms: self.mode.coast_ms,
        };
        if !self.sampling {
            return match self.wait(active) {
                Wait::Completed => coast,
                Wait::Interrupted => ControllerState::AwaitingInstruction,
            };
        }

        let lead = active.saturating_sub(self.timing.drive_sample_margin_ms);
        if self.wait(lead) == Wait::Interrupted {
            return ControllerState::AwaitingInstruction;
        }
        self.triple = self.read_back_emf().map(|drive| PartialSample {
            direction,
            drive_started_ms: started,
            drive,
            immediate: None,
        });
        if self.wait(active - lead) == Wait::Interrupted {
            self.triple = None;
            return ControllerState::AwaitingInstruction;
        }
        if self.triple.is_some() {
            ControllerState::SampleImmediate(direction)
        } else {
            coast
        }
    }

    fn sample_immediate(&mut self, direction: Direction) -> ControllerState {
        self.release();
        if let (Some(reading), Some(partial)) = (self.read_back_emf(), self.triple.as_mut()) {
            partial.immediate = Some(reading);
            return ControllerState::SampleSettled(direction);
        }
        self.triple = None;
        ControllerState::CoastRemaining {
            direction,
            ms: self.mode.coast_ms,
        }
    }

    fn sample_settled(&mut self, direction: Direction) -> ControllerState {
        let settle = self.timing.settle_ms;
        if self.wait(settle) == Wait::Interrupted {
            self.triple = None;
            return ControllerState::AwaitingInstruction;
        }
        let settled = self.read_back_emf();
        if let (Some(partial), Some(settled)) = (self.triple.take(), settled) {
            if let Some(immediate) = partial.immediate {
                let sample = BackEmfSample {
                    direction: partial.direction,
                    drive_started_ms: partial.drive_started_ms,
                    drive: partial.drive,
                    immediate,
                    settled,
                };
                log_sample(&sample);
                self.sink.record(&sample);
            }
        }
        ControllerState::CoastRemaining {
            direction,
            ms: self.mode.coast_ms.saturating_sub(settle),
        }
    }

    fn coast_remaining(&mut self, direction: Direction, ms: u32) -> ControllerState {
        self.release();
        match self.wait(ms) {
            Wait::Interrupted => ControllerState::AwaitingInstruction,
            Wait::Completed => match direction {
                Direction::Forward => ControllerState::Drive(Direction::Reverse),
                Direction::Reverse => ControllerState::AwaitingInstruction,
            },
        }
    }

    fn finish(mut self, reason: ShutdownReason) -> Handoff<A, L> {
        self.force_neutral();
        let to_input = match reason {
            ShutdownReason::SessionTimeout => ControlMessage::SessionTimedOut,
            _ => ControlMessage::EmergencyShutdown,
        };
        if self.peers.input.post(to_input).is_err() {
            log::debug!("Input handler already gone");
        }
        if self.peers.wireless.post(ControlMessage::EmergencyShutdown).is_err() {
            log::debug!("Wireless interface already gone");
        }
        log::info!("Controller stopped ({:?})", reason);
        Handoff {
            outputs: self.outputs,
            reason,
        }
    }

    // ------------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------------

    fn wait(&mut self, ms: u32) -> Wait {
        let deadline = self.clock.now_ms() + u64::from(ms);
        loop {
            let now = self.clock.now_ms();
            if now >= deadline {
                return Wait::Completed;
            }
            let slice = (deadline - now).min(u64::from(self.timing.quantum_ms)) as u32;
            if let Some(msg) = self.inbox.recv_timeout_ms(slice) {
                let class = self.pending.absorb(msg);
                if self.interrupts(class) {
                    self.force_neutral();
                    return Wait::Interrupted;
                }
            }
        }
    }

    fn interrupts(&self, class: MessageClass) -> bool {
        match class {
            MessageClass::Shutdown | MessageClass::ModeChange => true,
            MessageClass::Tuning => self.mode.is_custom(),
            MessageClass::Advisory | MessageClass::Foreign => false,
        }
    }

    /// Coast + clear unless already neutral.
    fn release(&mut self) {
        if self.engaged {
            self.force_neutral();
        }
    }

    fn force_neutral(&mut self) {
        // a failed coast stays engaged and is retried on the next edge
        self.engaged = !self.outputs.neutral();
    }

    fn read_back_emf(&mut self) -> Option<Reading> {
        match self.sensor.read_millivolts() {
            Ok(millivolts) => Some(Reading {
                millivolts,
                at_ms: self.clock.now_ms(),
            }),
            Err(e) => {
                log::warn!("Back-EMF read failed: {:?}", e);
                None
            }
        }
    }

    fn in_indication_window(&self, now: u64) -> bool {
        now.saturating_sub(self.session.indication_started_ms)
            < u64::from(self.timing.indication_window_ms)
    }

    fn indicator_on(&self, now: u64) -> bool {
        let custom_session = self.mode.is_custom() && self.tuning.indicator.enabled;
        self.in_indication_window(now) || custom_session || self.session.last_minute_warned
    }

    fn indicator_color(&self) -> (Rgb, u8) {
        let settings = &self.tuning.indicator;
        let color = match catalog_palette_index(self.mode.id) {
            Some(index) => PALETTE[index],
            None => settings.rgb(),
        };
        (color, settings.brightness_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{ActuatorOutput, IndicatorOutput, MockActuator, MockBackEmf, MockClock, MockIndicator, ScriptedInbox};
    use crate::mode::CATALOG;
    use std::sync::mpsc;

    fn controller(
        inbox: ScriptedInbox,
        clock: &MockClock,
    ) -> ActuatorController<
        MockActuator,
        MockIndicator,
        MockBackEmf,
        ScriptedInbox,
        mpsc::Sender<ControlMessage>,
        MockClock,
    > {
        let outputs = DriveOutputs::new(MockActuator::new(clock.clone()), MockIndicator::new(clock.clone()));
        let (input, _) = mpsc::channel();
        let (wireless, _) = mpsc::channel();
        let peers = Peers::new(input, wireless, Arc::new(StatusBoard::default()));
        ActuatorController::new(outputs, MockBackEmf::new(500), inbox, peers, clock.clone())
    }

    #[test]
    fn catalog_colors_follow_mode() {
        assert_eq!(catalog_palette_index(ModeId::OneHzHalf), Some(0));
        assert_eq!(catalog_palette_index(ModeId::Custom), None);
    }

    #[test]
    fn first_half_cycle_drives_forward_at_catalog_intensity() {
        let clock = MockClock::new();
        let inbox = ScriptedInbox::new(clock.clone()).with_message(100, ControlMessage::EmergencyShutdown);
        let handoff = controller(inbox, &clock).run();

        let events = handoff.outputs.actuator.events();
        assert_eq!(events[0], (0, ActuatorOutput::Forward(CATALOG[0].intensity_percent)));
        assert_eq!(handoff.outputs.actuator.output(), ActuatorOutput::Coast);
        assert_eq!(handoff.outputs.indicator.output(), IndicatorOutput::Off);
    }

    #[test]
    fn invalid_mode_request_is_ignored() {
        let clock = MockClock::new();
        let mut bogus = CATALOG[1];
        bogus.intensity_percent = 100;
        let inbox = ScriptedInbox::new(clock.clone())
            .with_message(100, ControlMessage::ModeChanged(bogus))
            .with_message(1_500, ControlMessage::EmergencyShutdown);
        let handoff = controller(inbox, &clock).run();

        assert!(handoff
            .outputs
            .actuator
            .drives()
            .iter()
            .all(|(_, o)| *o != ActuatorOutput::Forward(100)));
    }
}
