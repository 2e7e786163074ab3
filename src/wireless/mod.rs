//! Wireless configuration interface.
//!
//! Owns the [`ConfigRegisters`] table and the advertising life cycle. A
//! [`WirelessTransport`] delivers register reads and writes; accepted writes
//! are republished to the Actuator Controller as [`ControlMessage`]s.
//!
//! # States
//!
//! ```text
//!            boot
//!              │
//!              ▼        timeout (300 s)
//!   ┌──► Advertising ───────────────► Idle
//!   │      │    ▲                      │
//!   │ link │    │ link lost            │ ReenableAdvertising
//!   │  up  ▼    │                      │
//!   │   Connected                      │
//!   └──────────────────────────────────┘
//!
//!   EmergencyShutdown from any state ──► ShuttingDown
//! ```
//!
//! # Side Effects of a Write
//!
//! | Field class | Message to the controller |
//! |-------------|---------------------------|
//! | `mode` | `ModeChanged`, resolved against the custom profile |
//! | custom profile and indicator fields | `ConfigChanged`, only while custom mode is active |
//! | `session_duration` | `ConfigChanged` in every mode |
//!
//! A tuning write made while a catalog mode runs is stored and marked
//! pending; the interface sends one `ConfigChanged` as soon as the status
//! board reports custom mode active.

mod registers;

#[cfg(feature = "serde-json-core")]
pub mod codec;

pub use registers::*;

use crate::config::WirelessTiming;
use crate::messages::{ControlMessage, Inbox, Outbox};
use crate::mode::{resolve, ModeId};
use crate::status::{LinkStatus, StatusBoard};
use crate::store::PersistedConfig;
use crate::traits::{Clock, RegisterOp, RegisterReply, WirelessTransport};
use alloc::sync::Arc;

/// Advertising life-cycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// Radio quiet; waiting for `ReenableAdvertising`.
    Idle,
    /// Discoverable since `since_ms`.
    Advertising {
        /// Start of the current advertising window.
        since_ms: u64,
    },
    /// A client is connected.
    Connected,
    /// Terminal.
    ShuttingDown,
}

/// Register values handed to the Shutdown Orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigHandoff {
    /// Persisted subset of the register table.
    pub config: PersistedConfig,
    /// Whether any write was accepted during the session.
    pub dirty: bool,
}

impl From<&ConfigRegisters> for ConfigHandoff {
    fn from(regs: &ConfigRegisters) -> Self {
        Self {
            config: regs.to_persisted(),
            dirty: regs.is_dirty(),
        }
    }
}

/// The Wireless Interface task.
///
/// - `T`: register transport
/// - `I`: this task's inbox
/// - `O`: outbox to the Actuator Controller
/// - `C`: clock for the advertising window
pub struct WirelessInterface<T, I, O, C> {
    transport: T,
    inbox: I,
    controller: O,
    clock: C,
    registers: ConfigRegisters,
    link: Arc<LinkStatus>,
    status: Arc<StatusBoard>,
    timing: WirelessTiming,
    state: LinkState,
    tuning_pending: bool,
}

impl<T, I, O, C> WirelessInterface<T, I, O, C>
where
    T: WirelessTransport,
    I: Inbox,
    O: Outbox,
    C: Clock,
{
    /// Creates the interface in `Idle`. Call [`start`](Self::start) or
    /// [`run`](Self::run) to begin advertising.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: T,
        inbox: I,
        controller: O,
        clock: C,
        registers: ConfigRegisters,
        link: Arc<LinkStatus>,
        status: Arc<StatusBoard>,
        timing: WirelessTiming,
    ) -> Self {
        Self {
            transport,
            inbox,
            controller,
            clock,
            registers,
            link,
            status,
            timing,
            state: LinkState::Idle,
            tuning_pending: false,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Register table.
    #[inline]
    pub fn registers(&self) -> &ConfigRegisters {
        &self.registers
    }

    /// The transport, for inspection.
    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns `true` while a tuning change waits for custom mode.
    #[inline]
    pub fn has_pending_tuning(&self) -> bool {
        self.tuning_pending
    }

    /// Boot transition: start advertising if enabled.
    pub fn start(&mut self) {
        if self.timing.advertise_on_boot {
            self.begin_advertising();
        }
    }

    /// Inbox poll period for the current state.
    pub fn poll_interval_ms(&self) -> u32 {
        match self.state {
            LinkState::Idle => self.timing.idle_poll_ms,
            _ => self.timing.active_poll_ms,
        }
    }

    /// Runs the task loop until shutdown and returns the register values.
    pub fn run(mut self) -> ConfigHandoff {
        self.start();
        loop {
            if let Some(msg) = self.inbox.recv_timeout_ms(self.poll_interval_ms()) {
                self.handle_message(msg);
            }
            if self.state == LinkState::ShuttingDown {
                break;
            }
            self.tick();
        }
        log::info!(
            "Wireless interface stopped (config dirty: {})",
            self.registers.is_dirty()
        );
        ConfigHandoff::from(&self.registers)
    }

    /// Handles one inbox message.
    pub fn handle_message(&mut self, msg: ControlMessage) {
        if self.state == LinkState::ShuttingDown {
            return;
        }
        match msg {
            ControlMessage::EmergencyShutdown | ControlMessage::BatteryCritical { .. } => {
                self.shut_down();
            }
            ControlMessage::ReenableAdvertising => match self.state {
                LinkState::Idle => {
                    log::info!("Advertising re-enabled");
                    self.begin_advertising();
                }
                LinkState::Advertising { .. } => {
                    self.state = LinkState::Advertising {
                        since_ms: self.clock.now_ms(),
                    };
                }
                LinkState::Connected | LinkState::ShuttingDown => {}
            },
            other => log::debug!("Wireless ignoring {:?}", other),
        }
    }

    /// One poll period: link flags, advertising window, pending tuning, and
    /// queued requests.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        match self.state {
            LinkState::Advertising { since_ms } => {
                if self.link.is_connected() {
                    log::info!("Client connected");
                    self.state = LinkState::Connected;
                } else if now.saturating_sub(since_ms) >= u64::from(self.timing.advertising_timeout_ms) {
                    log::info!("Advertising timed out");
                    if let Err(e) = self.transport.stop_advertising() {
                        log::warn!("Failed to stop advertising: {:?}", e);
                    }
                    self.link.set_advertising(false);
                    self.state = LinkState::Idle;
                }
            }
            LinkState::Connected => {
                if !self.link.is_connected() {
                    log::info!("Client disconnected");
                    self.begin_advertising();
                }
            }
            LinkState::Idle | LinkState::ShuttingDown => {}
        }

        if self.tuning_pending && self.status.active_mode() == ModeId::Custom {
            self.notify_tuning();
        }

        if self.state != LinkState::ShuttingDown {
            self.serve_requests();
        }
    }

    /// Answers every queued request, one at a time.
    pub fn serve_requests(&mut self) {
        while let Some(op) = self.transport.poll_request() {
            let reply = self.handle_op(op);
            self.transport.respond(reply);
        }
    }

    fn handle_op(&mut self, op: RegisterOp) -> RegisterReply {
        match op {
            RegisterOp::Read(field) => RegisterReply::Value(field, self.registers.read(field, &self.status)),
            RegisterOp::Write(field, value) => match self.registers.write(field, value) {
                Ok(effect) => {
                    log::info!("{} <- {:?}", field.name(), value);
                    self.apply(effect);
                    RegisterReply::Accepted(field)
                }
                Err(e) => {
                    log::warn!("Rejected write to {}: {}", field.name(), e);
                    RegisterReply::Rejected(field, e)
                }
            },
        }
    }

    fn apply(&mut self, effect: WriteEffect) {
        match effect {
            WriteEffect::SwitchMode(id) => {
                // the controller resolves custom against its own tuning
                if id == ModeId::Custom && self.tuning_pending {
                    self.notify_tuning();
                }
                let mode = resolve(id, &self.registers.custom());
                self.send(ControlMessage::ModeChanged(mode));
            }
            WriteEffect::Tuning => {
                if self.status.active_mode() == ModeId::Custom {
                    self.notify_tuning();
                } else {
                    self.tuning_pending = true;
                }
            }
            WriteEffect::Device => self.notify_tuning(),
        }
    }

    fn notify_tuning(&mut self) {
        self.tuning_pending = false;
        self.send(ControlMessage::ConfigChanged(self.registers.live_tuning()));
    }

    fn send(&self, msg: ControlMessage) {
        if self.controller.post(msg).is_err() {
            log::warn!("Controller inbox closed, dropped {:?}", msg);
        }
    }

    fn begin_advertising(&mut self) {
        match self.transport.start_advertising() {
            Ok(()) => {
                self.link.set_advertising(true);
                self.state = LinkState::Advertising {
                    since_ms: self.clock.now_ms(),
                };
                log::info!("Advertising");
            }
            Err(e) => {
                log::warn!("Failed to start advertising: {:?}", e);
                self.link.set_advertising(false);
                self.state = LinkState::Idle;
            }
        }
    }

    fn shut_down(&mut self) {
        if self.link.is_advertising() || matches!(self.state, LinkState::Advertising { .. }) {
            if let Err(e) = self.transport.stop_advertising() {
                log::warn!("Failed to stop advertising: {:?}", e);
            }
            self.link.set_advertising(false);
        }
        self.state = LinkState::ShuttingDown;
        log::info!("Wireless shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockClock, MockTransport};
    use crate::mode::CATALOG;
    use crate::traits::Rgb;
    use std::sync::mpsc::{self, Receiver, Sender};

    struct Rig {
        wireless: WirelessInterface<MockTransport, Receiver<ControlMessage>, Sender<ControlMessage>, MockClock>,
        transport: MockTransport,
        clock: MockClock,
        link: Arc<LinkStatus>,
        status: Arc<StatusBoard>,
        to_wireless: Sender<ControlMessage>,
        controller: Receiver<ControlMessage>,
    }

    fn rig() -> Rig {
        let transport = MockTransport::new();
        let clock = MockClock::new();
        let link = Arc::new(LinkStatus::new());
        let status = Arc::new(StatusBoard::default());
        let (to_wireless, inbox) = mpsc::channel();
        let (to_controller, controller) = mpsc::channel();
        let mut wireless = WirelessInterface::new(
            transport.clone(),
            inbox,
            to_controller,
            clock.clone(),
            ConfigRegisters::default(),
            link.clone(),
            status.clone(),
            WirelessTiming::default(),
        );
        wireless.start();
        Rig {
            wireless,
            transport,
            clock,
            link,
            status,
            to_wireless,
            controller,
        }
    }

    #[test]
    fn advertises_on_boot_then_times_out() {
        let mut r = rig();
        assert!(matches!(r.wireless.state(), LinkState::Advertising { .. }));
        assert!(r.transport.is_advertising());
        assert!(r.link.is_advertising());

        r.clock.advance(299_999);
        r.wireless.tick();
        assert!(matches!(r.wireless.state(), LinkState::Advertising { .. }));

        r.clock.advance(1);
        r.wireless.tick();
        assert_eq!(r.wireless.state(), LinkState::Idle);
        assert!(!r.transport.is_advertising());
        assert_eq!(r.wireless.poll_interval_ms(), 1000);
    }

    #[test]
    fn reenable_from_idle_restarts_window() {
        let mut r = rig();
        r.clock.advance(300_000);
        r.wireless.tick();
        assert_eq!(r.wireless.state(), LinkState::Idle);

        r.wireless.handle_message(ControlMessage::ReenableAdvertising);
        assert_eq!(
            r.wireless.state(),
            LinkState::Advertising { since_ms: 300_000 }
        );
        assert_eq!(r.transport.start_count(), 2);
        assert_eq!(r.wireless.poll_interval_ms(), 100);
    }

    #[test]
    fn disconnect_returns_to_advertising() {
        let mut r = rig();
        r.link.set_connected(true);
        r.wireless.tick();
        assert_eq!(r.wireless.state(), LinkState::Connected);

        r.clock.advance(400_000);
        r.wireless.tick();
        assert_eq!(r.wireless.state(), LinkState::Connected);

        r.link.set_connected(false);
        r.wireless.tick();
        assert_eq!(
            r.wireless.state(),
            LinkState::Advertising { since_ms: 400_000 }
        );
    }

    #[test]
    fn mode_write_sends_resolved_mode() {
        let mut r = rig();
        r.transport
            .push_request(RegisterOp::Write(Field::Mode, RegisterValue::U8(2)));
        r.wireless.tick();

        assert_eq!(r.transport.replies(), vec![RegisterReply::Accepted(Field::Mode)]);
        assert_eq!(
            r.controller.try_recv(),
            Ok(ControlMessage::ModeChanged(CATALOG[2]))
        );
    }

    #[test]
    fn rejected_write_sends_nothing() {
        let mut r = rig();
        r.transport.push_request(RegisterOp::Write(
            Field::CustomFrequency,
            RegisterValue::U16(250),
        ));
        r.transport
            .push_request(RegisterOp::Write(Field::BatteryLevel, RegisterValue::U8(1)));
        r.wireless.tick();

        assert_eq!(
            r.transport.replies(),
            vec![
                RegisterReply::Rejected(Field::CustomFrequency, RegisterError::OutOfRange),
                RegisterReply::Rejected(Field::BatteryLevel, RegisterError::ReadOnly),
            ]
        );
        assert!(r.controller.try_recv().is_err());
        assert!(!r.wireless.registers().is_dirty());
    }

    #[test]
    fn tuning_waits_for_custom_mode() {
        let mut r = rig();
        r.transport.push_request(RegisterOp::Write(
            Field::CustomDuty,
            RegisterValue::U8(30),
        ));
        r.wireless.tick();
        assert!(r.controller.try_recv().is_err());
        assert!(r.wireless.has_pending_tuning());

        // button switched to custom
        r.status.set_active_mode(ModeId::Custom);
        r.wireless.tick();
        match r.controller.try_recv() {
            Ok(ControlMessage::ConfigChanged(tuning)) => {
                assert_eq!(tuning.custom.duty_percent(), 30)
            }
            other => panic!("expected ConfigChanged, got {other:?}"),
        }
        assert!(!r.wireless.has_pending_tuning());

        r.wireless.tick();
        assert!(r.controller.try_recv().is_err());
    }

    #[test]
    fn tuning_while_custom_is_immediate() {
        let mut r = rig();
        r.status.set_active_mode(ModeId::Custom);
        r.transport.push_request(RegisterOp::Write(
            Field::LedRgb,
            RegisterValue::Rgb(Rgb::new(0, 0, 9)),
        ));
        r.wireless.tick();
        match r.controller.try_recv() {
            Ok(ControlMessage::ConfigChanged(tuning)) => {
                assert_eq!(tuning.indicator.rgb(), Rgb::new(0, 0, 9))
            }
            other => panic!("expected ConfigChanged, got {other:?}"),
        }
    }

    #[test]
    fn session_duration_always_notifies() {
        let mut r = rig();
        r.transport.push_request(RegisterOp::Write(
            Field::SessionDuration,
            RegisterValue::U32(3600),
        ));
        r.wireless.tick();
        match r.controller.try_recv() {
            Ok(ControlMessage::ConfigChanged(tuning)) => {
                assert_eq!(tuning.session_duration_s, 3600)
            }
            other => panic!("expected ConfigChanged, got {other:?}"),
        }
    }

    #[test]
    fn switching_to_custom_flushes_pending_tuning_first() {
        let mut r = rig();
        r.transport.push_request(RegisterOp::Write(
            Field::CustomFrequency,
            RegisterValue::U16(200),
        ));
        r.transport
            .push_request(RegisterOp::Write(Field::Mode, RegisterValue::U8(4)));
        r.wireless.tick();

        assert!(matches!(
            r.controller.try_recv(),
            Ok(ControlMessage::ConfigChanged(_))
        ));
        match r.controller.try_recv() {
            Ok(ControlMessage::ModeChanged(mode)) => {
                assert!(mode.is_custom());
                assert_eq!(mode.half_cycle_ms(), 250);
            }
            other => panic!("expected ModeChanged, got {other:?}"),
        }
    }

    #[test]
    fn reads_reflect_status_board() {
        let mut r = rig();
        r.status.set_battery_percent(42);
        r.status.set_session_elapsed_s(77);
        r.transport.push_request(RegisterOp::Read(Field::BatteryLevel));
        r.transport.push_request(RegisterOp::Read(Field::SessionTime));
        r.wireless.tick();
        assert_eq!(
            r.transport.replies(),
            vec![
                RegisterReply::Value(Field::BatteryLevel, RegisterValue::U8(42)),
                RegisterReply::Value(Field::SessionTime, RegisterValue::U32(77)),
            ]
        );
    }

    #[test]
    fn shutdown_stops_advertising_and_hands_off_dirty_config() {
        let r = rig();
        r.transport.push_request(RegisterOp::Write(
            Field::LedBrightness,
            RegisterValue::U8(30),
        ));
        let mut wireless = r.wireless;
        wireless.tick();
        r.to_wireless.send(ControlMessage::EmergencyShutdown).unwrap();

        let handoff = wireless.run();
        assert!(handoff.dirty);
        assert_eq!(handoff.config.led_brightness, 30);
        assert!(!r.transport.is_advertising());
        assert!(!r.link.is_advertising());
    }

    #[test]
    fn clean_session_hands_off_clean_config() {
        let r = rig();
        r.to_wireless.send(ControlMessage::EmergencyShutdown).unwrap();
        let handoff = r.wireless.run();
        assert!(!handoff.dirty);
        assert_eq!(handoff.config, PersistedConfig::default());
    }
}
