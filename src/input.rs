//! The Input Handler: a debounced single-button state machine.
//!
//! The button is polled every [`ButtonTiming::sample_ms`]. Hold time is
//! measured from the first sample that saw the button down.
//!
//! | Hold | Released | Event |
//! |------|----------|-------|
//! | < 50 ms | | bounce, ignored |
//! | 50 ms .. 1 s | yes | `ModeChanged(next)` to the controller |
//! | 1 s .. 2 s | yes | `ReenableAdvertising` to the wireless interface |
//! | 2 s .. 5 s | yes | countdown cancelled, nothing sent |
//! | 5 s | no | `EmergencyShutdown` to the controller and the wireless interface |
//!
//! A release only counts once it has been stable for the debounce time. Hold
//! time ends at the first released sample.
//!
//! [`ButtonMachine`] is the pure state machine; [`InputHandler`] wraps it in
//! the task loop.
//!
//! ```rust
//! use bilateral_haptic::config::ButtonTiming;
//! use bilateral_haptic::input::{ButtonMachine, InputEvent};
//!
//! let mut machine = ButtonMachine::new(ButtonTiming::default());
//! assert_eq!(machine.poll(true, 0), None);
//! assert_eq!(machine.poll(true, 50), None);
//! assert_eq!(machine.poll(false, 300), None);
//! assert_eq!(machine.poll(false, 350), Some(InputEvent::ShortPress));
//! ```

use crate::config::ButtonTiming;
use crate::messages::{ControlMessage, Inbox, Outbox};
use crate::mode::{resolve, CustomProfile};
use crate::status::StatusBoard;
use crate::traits::{ButtonInput, Clock, Delay};
use alloc::sync::Arc;

/// Button state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    /// Released.
    Idle,
    /// Down, not yet stable.
    Debounce {
        /// First sample that saw the button down.
        since_ms: u64,
    },
    /// Accepted press.
    Pressed {
        /// First sample that saw the button down.
        since_ms: u64,
        /// First sample of a release not yet stable.
        released_ms: Option<u64>,
    },
    /// Held past the hold threshold; a stable release cancels.
    ShutdownCountdown {
        /// Start of the countdown.
        since_ms: u64,
        /// First sample of a release not yet stable.
        released_ms: Option<u64>,
    },
    /// Shutdown requested (terminal).
    ShutdownSent,
    /// The session ended elsewhere (terminal).
    Quiesced,
}

impl ButtonState {
    /// Returns `true` for states that never emit again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ButtonState::ShutdownSent | ButtonState::Quiesced)
    }
}

/// Semantic button event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// Released before the advertising threshold.
    ShortPress,
    /// Released between the advertising and hold thresholds.
    ReenableAdvertising,
    /// Hold threshold reached.
    CountdownStarted,
    /// Released during the countdown.
    CountdownCancelled,
    /// Countdown completed.
    Shutdown,
}

/// Pure button state machine.
#[derive(Clone, Debug)]
pub struct ButtonMachine {
    timing: ButtonTiming,
    state: ButtonState,
}

impl ButtonMachine {
    /// Creates an idle machine.
    pub fn new(timing: ButtonTiming) -> Self {
        Self {
            timing,
            state: ButtonState::Idle,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Enters `Quiesced`; no further events.
    pub fn quiesce(&mut self) {
        self.state = ButtonState::Quiesced;
    }

    /// Feeds one sample.
    pub fn poll(&mut self, pressed: bool, now_ms: u64) -> Option<InputEvent> {
        let t = &self.timing;
        let (next, event) = match self.state {
            ButtonState::Idle if pressed => (ButtonState::Debounce { since_ms: now_ms }, None),
            ButtonState::Idle => (ButtonState::Idle, None),

            ButtonState::Debounce { .. } if !pressed => (ButtonState::Idle, None),
            ButtonState::Debounce { since_ms } => {
                if now_ms.saturating_sub(since_ms) >= u64::from(t.debounce_ms) {
                    (
                        ButtonState::Pressed {
                            since_ms,
                            released_ms: None,
                        },
                        None,
                    )
                } else {
                    (self.state, None)
                }
            }

            ButtonState::Pressed { since_ms, .. } if pressed => {
                if now_ms.saturating_sub(since_ms) >= u64::from(t.hold_ms) {
                    (
                        ButtonState::ShutdownCountdown {
                            since_ms: now_ms,
                            released_ms: None,
                        },
                        Some(InputEvent::CountdownStarted),
                    )
                } else {
                    (
                        ButtonState::Pressed {
                            since_ms,
                            released_ms: None,
                        },
                        None,
                    )
                }
            }
            ButtonState::Pressed {
                since_ms,
                released_ms,
            } => {
                let up = released_ms.unwrap_or(now_ms);
                if now_ms.saturating_sub(up) < u64::from(t.debounce_ms) {
                    (
                        ButtonState::Pressed {
                            since_ms,
                            released_ms: Some(up),
                        },
                        None,
                    )
                } else {
                    // hold time ends at the first released sample
                    let held = up.saturating_sub(since_ms);
                    let event = if held < u64::from(t.advertise_hold_ms) {
                        Some(InputEvent::ShortPress)
                    } else if held < u64::from(t.hold_ms) {
                        Some(InputEvent::ReenableAdvertising)
                    } else {
                        None
                    };
                    (ButtonState::Idle, event)
                }
            }

            ButtonState::ShutdownCountdown { since_ms, .. } if pressed => {
                if now_ms.saturating_sub(since_ms) >= u64::from(t.countdown_ms) {
                    (ButtonState::ShutdownSent, Some(InputEvent::Shutdown))
                } else {
                    (
                        ButtonState::ShutdownCountdown {
                            since_ms,
                            released_ms: None,
                        },
                        None,
                    )
                }
            }
            ButtonState::ShutdownCountdown {
                since_ms,
                released_ms,
            } => {
                let up = released_ms.unwrap_or(now_ms);
                if now_ms.saturating_sub(up) < u64::from(t.debounce_ms) {
                    (
                        ButtonState::ShutdownCountdown {
                            since_ms,
                            released_ms: Some(up),
                        },
                        None,
                    )
                } else {
                    (ButtonState::Idle, Some(InputEvent::CountdownCancelled))
                }
            }

            terminal @ (ButtonState::ShutdownSent | ButtonState::Quiesced) => (terminal, None),
        };
        self.state = next;
        event
    }
}

/// The Input Handler task.
pub struct InputHandler<B, I, O, C> {
    button: B,
    inbox: I,
    controller: O,
    wireless: O,
    clock: C,
    status: Arc<StatusBoard>,
    machine: ButtonMachine,
    sample_ms: u32,
}

impl<B, I, O, C> InputHandler<B, I, O, C>
where
    B: ButtonInput,
    I: Inbox,
    O: Outbox,
    C: Clock,
{
    /// Creates the task.
    pub fn new(
        button: B,
        inbox: I,
        controller: O,
        wireless: O,
        clock: C,
        status: Arc<StatusBoard>,
        timing: ButtonTiming,
    ) -> Self {
        Self {
            button,
            inbox,
            controller,
            wireless,
            clock,
            status,
            sample_ms: timing.sample_ms.max(1),
            machine: ButtonMachine::new(timing),
        }
    }

    /// Current button state.
    #[inline]
    pub fn state(&self) -> ButtonState {
        self.machine.state()
    }

    /// Polls until a terminal state, then hands the button back.
    pub fn run<D: Delay>(mut self, mut delay: D) -> B {
        log::info!("Input handler started");
        while !self.poll_once() {
            delay.delay_ms(self.sample_ms);
        }
        log::info!("Input handler stopped ({:?})", self.machine.state());
        self.button
    }

    /// Handles the inbox and one button sample. Returns `true` once terminal.
    pub fn poll_once(&mut self) -> bool {
        while let Some(msg) = self.inbox.try_recv_message() {
            match msg {
                ControlMessage::SessionTimedOut | ControlMessage::EmergencyShutdown => {
                    self.machine.quiesce();
                }
                other => log::debug!("Input ignoring {:?}", other),
            }
        }
        if self.machine.state().is_terminal() {
            return true;
        }

        let pressed = self.button.is_pressed();
        if let Some(event) = self.machine.poll(pressed, self.clock.now_ms()) {
            self.dispatch(event);
        }
        self.machine.state().is_terminal()
    }

    fn dispatch(&mut self, event: InputEvent) {
        match event {
            InputEvent::ShortPress => {
                let current = self.status.active_mode();
                let next = current.next();
                log::info!("Mode change: {:?} -> {:?}", current, next);
                // custom timing is resolved by the controller
                let mode = resolve(next, &CustomProfile::default());
                send(&self.controller, ControlMessage::ModeChanged(mode));
            }
            InputEvent::ReenableAdvertising => {
                log::info!("Advertising re-enable requested");
                send(&self.wireless, ControlMessage::ReenableAdvertising);
            }
            InputEvent::CountdownStarted => log::info!("Hold detected, shutdown countdown started"),
            InputEvent::CountdownCancelled => log::info!("Shutdown countdown cancelled"),
            InputEvent::Shutdown => {
                log::info!("Emergency shutdown requested");
                send(&self.controller, ControlMessage::EmergencyShutdown);
                send(&self.wireless, ControlMessage::EmergencyShutdown);
            }
        }
    }
}

fn send<O: Outbox>(outbox: &O, msg: ControlMessage) {
    if outbox.post(msg).is_err() {
        log::warn!("Failed to send {:?}: receiver gone", msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ButtonMachine {
        ButtonMachine::new(ButtonTiming::default())
    }

    /// Holds from 0 until `release_ms`, sampling every 10 ms.
    fn hold(machine: &mut ButtonMachine, release_ms: u64) -> Vec<InputEvent> {
        let mut events = Vec::new();
        let mut t = 0;
        while t < release_ms {
            events.extend(machine.poll(true, t));
            t += 10;
        }
        while t < release_ms + 50 {
            events.extend(machine.poll(false, t));
            t += 10;
        }
        events.extend(machine.poll(false, t));
        events
    }

    #[test]
    fn bounce_is_ignored() {
        let mut m = machine();
        assert_eq!(hold(&mut m, 40), vec![]);
        assert_eq!(m.state(), ButtonState::Idle);
    }

    #[test]
    fn short_press_at_debounce_boundary() {
        let mut m = machine();
        assert_eq!(hold(&mut m, 60), vec![InputEvent::ShortPress]);
    }

    #[test]
    fn release_window_selects_event() {
        assert_eq!(hold(&mut machine(), 990), vec![InputEvent::ShortPress]);
        assert_eq!(
            hold(&mut machine(), 1000),
            vec![InputEvent::ReenableAdvertising]
        );
        assert_eq!(
            hold(&mut machine(), 1990),
            vec![InputEvent::ReenableAdvertising]
        );
    }

    #[test]
    fn release_during_countdown_cancels() {
        let mut m = machine();
        assert_eq!(
            hold(&mut m, 4000),
            vec![InputEvent::CountdownStarted, InputEvent::CountdownCancelled]
        );
        assert_eq!(m.state(), ButtonState::Idle);
    }

    #[test]
    fn full_hold_shuts_down_once() {
        let mut m = machine();
        let events = hold(&mut m, 6000);
        assert_eq!(
            events,
            vec![InputEvent::CountdownStarted, InputEvent::Shutdown]
        );
        assert_eq!(m.state(), ButtonState::ShutdownSent);
        assert_eq!(m.poll(true, 7000), None);
    }

    #[test]
    fn release_bounce_does_not_end_the_press() {
        let mut m = machine();
        let mut events = Vec::new();
        for t in (0..500).step_by(10) {
            events.extend(m.poll(true, t));
        }
        // 20 ms open contact, then held again
        events.extend(m.poll(false, 500));
        events.extend(m.poll(false, 510));
        for t in (520..1200).step_by(10) {
            events.extend(m.poll(true, t));
        }
        for t in (1200..=1250).step_by(10) {
            events.extend(m.poll(false, t));
        }
        assert_eq!(events, vec![InputEvent::ReenableAdvertising]);
    }

    #[test]
    fn countdown_survives_a_release_glitch() {
        let mut m = machine();
        let mut events = Vec::new();
        for t in (0..3000).step_by(10) {
            events.extend(m.poll(true, t));
        }
        events.extend(m.poll(false, 3000));
        for t in (3010..=5000).step_by(10) {
            events.extend(m.poll(true, t));
        }
        assert_eq!(
            events,
            vec![InputEvent::CountdownStarted, InputEvent::Shutdown]
        );
    }

    #[test]
    fn handler_stays_silent_after_session_timeout() {
        use crate::hal::{MockButton, MockClock, ScriptedInbox};
        use std::sync::mpsc;

        let clock = MockClock::new();
        let inbox =
            ScriptedInbox::new(clock.clone()).with_message(100, ControlMessage::SessionTimedOut);
        let button = MockButton::with_timeline(clock.clone(), &[(200, true), (1_200, false)]);
        let (controller_tx, controller_rx) = mpsc::channel::<ControlMessage>();
        let (wireless_tx, wireless_rx) = mpsc::channel::<ControlMessage>();
        let mut handler = InputHandler::new(
            button,
            inbox,
            controller_tx,
            wireless_tx,
            clock.clone(),
            Arc::new(StatusBoard::default()),
            ButtonTiming::default(),
        );

        let mut terminal_at = None;
        for t in (0..2_000).step_by(10) {
            clock.set(t);
            if handler.poll_once() && terminal_at.is_none() {
                terminal_at = Some(t);
            }
        }

        assert_eq!(terminal_at, Some(100));
        assert_eq!(handler.state(), ButtonState::Quiesced);
        assert!(controller_rx.try_recv().is_err());
        assert!(wireless_rx.try_recv().is_err());
    }

    #[test]
    fn handler_sends_next_mode_on_short_press() {
        use crate::hal::{MockButton, MockClock, ScriptedInbox};
        use crate::mode::ModeId;
        use std::sync::mpsc;

        let clock = MockClock::new();
        let button = MockButton::with_timeline(clock.clone(), &[(200, true), (500, false)]);
        let (controller_tx, controller_rx) = mpsc::channel::<ControlMessage>();
        let (wireless_tx, wireless_rx) = mpsc::channel::<ControlMessage>();
        let mut handler = InputHandler::new(
            button,
            ScriptedInbox::new(clock.clone()),
            controller_tx,
            wireless_tx,
            clock.clone(),
            Arc::new(StatusBoard::default()),
            ButtonTiming::default(),
        );

        for t in (0..1_000).step_by(10) {
            clock.set(t);
            handler.poll_once();
        }

        match controller_rx.try_recv() {
            Ok(ControlMessage::ModeChanged(mode)) => assert_eq!(mode.id, ModeId::OneHzQuarter),
            other => panic!("expected ModeChanged, got {other:?}"),
        }
        assert!(wireless_rx.try_recv().is_err());
        assert_eq!(handler.state(), ButtonState::Idle);
    }

    #[test]
    fn quiesced_never_emits() {
        let mut m = machine();
        m.quiesce();
        assert_eq!(hold(&mut m, 6000), vec![]);
        assert_eq!(m.state(), ButtonState::Quiesced);
    }
}
