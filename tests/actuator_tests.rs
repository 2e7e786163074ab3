//! Actuator Controller timeline tests on virtual time.

use bilateral_haptic::actuator::{ActuatorController, DriveOutputs, Handoff, Peers};
use bilateral_haptic::backemf::BackEmfSample;
use bilateral_haptic::hal::{
    ActuatorOutput, IndicatorOutput, MockActuator, MockBackEmf, MockClock, MockIndicator,
    ScriptedInbox,
};
use bilateral_haptic::status::StatusBoard;
use bilateral_haptic::{
    ControlMessage, CustomProfile, Direction, LiveTuning, ModeId, ShutdownReason, CATALOG,
};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

struct Rig {
    clock: MockClock,
    status: Arc<StatusBoard>,
    to_input: Receiver<ControlMessage>,
    to_wireless: Receiver<ControlMessage>,
}

fn rig() -> Rig {
    Rig {
        clock: MockClock::new(),
        status: Arc::new(StatusBoard::default()),
        to_input: mpsc::channel().1,
        to_wireless: mpsc::channel().1,
    }
}

/// Runs a controller over `inbox`, collecting completed back-EMF samples.
fn run(
    rig: &mut Rig,
    inbox: ScriptedInbox,
    tuning: LiveTuning,
) -> (Handoff<MockActuator, MockIndicator>, Vec<BackEmfSample>) {
    let (input_tx, input_rx) = mpsc::channel();
    let (wireless_tx, wireless_rx) = mpsc::channel();
    rig.to_input = input_rx;
    rig.to_wireless = wireless_rx;

    let (samples_tx, samples_rx) = mpsc::channel();
    let outputs = DriveOutputs::new(
        MockActuator::new(rig.clock.clone()),
        MockIndicator::new(rig.clock.clone()),
    );
    let handoff = ActuatorController::new(
        outputs,
        MockBackEmf::new(800),
        inbox,
        Peers::new(input_tx, wireless_tx, rig.status.clone()),
        rig.clock.clone(),
    )
    .with_tuning(tuning)
    .with_sample_sink(samples_tx)
    .run();
    (handoff, samples_rx.try_iter().collect())
}

// ============================================================================
// Alternation timeline
// ============================================================================

#[test]
fn one_hz_half_alternates_every_500ms() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone()).with_message(2_100, ControlMessage::EmergencyShutdown);
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    let drives = handoff.outputs.actuator.drives();
    assert_eq!(
        drives,
        vec![
            (0, ActuatorOutput::Forward(75)),
            (500, ActuatorOutput::Reverse(75)),
            (1_000, ActuatorOutput::Forward(75)),
            (1_500, ActuatorOutput::Reverse(75)),
            (2_000, ActuatorOutput::Forward(75)),
        ]
    );

    // every completed drive is followed by a coast at the end of its active time
    let events = handoff.outputs.actuator.events();
    for (at, _) in &drives[..drives.len() - 1] {
        assert!(events.contains(&(at + 250, ActuatorOutput::Coast)));
    }
}

#[test]
fn outputs_are_never_driven_while_coasting_period_runs() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone()).with_message(4_000, ControlMessage::EmergencyShutdown);
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    let events = handoff.outputs.actuator.events();
    for (at, output) in events {
        if output != ActuatorOutput::Coast {
            // drives only begin on half-cycle boundaries
            assert_eq!(at % 500, 0, "drive at {at} ms");
        }
    }
}

#[test]
fn samples_cover_the_indication_window_only() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone()).with_message(14_000, ControlMessage::EmergencyShutdown);
    let (_, samples) = run(&mut rig, inbox, LiveTuning::default());

    assert_eq!(samples.len(), 20);
    for (i, sample) in samples.iter().enumerate() {
        assert!(sample.is_ordered());
        assert_eq!(sample.drive_offset_ms(), 240);
        assert_eq!(sample.drive_started_ms, 500 * i as u64);
        let expected = if i % 2 == 0 { Direction::Forward } else { Direction::Reverse };
        assert_eq!(sample.direction, expected);
        assert_eq!(sample.settled.at_ms - sample.immediate.at_ms, 10);
    }
}

#[test]
fn indicator_follows_the_window() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone()).with_message(12_000, ControlMessage::EmergencyShutdown);
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    let lit = handoff.outputs.indicator.lit_at();
    assert_eq!(lit.first(), Some(&0));
    assert!(lit.iter().all(|&at| at < 10_000));
    assert_eq!(handoff.outputs.indicator.output(), IndicatorOutput::Off);
}

// ============================================================================
// Preemption
// ============================================================================

#[test]
fn shutdown_mid_drive_coasts_within_a_quantum() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone()).with_message(120, ControlMessage::EmergencyShutdown);
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    assert_eq!(handoff.reason, ShutdownReason::Emergency);
    let events = handoff.outputs.actuator.events();
    assert_eq!(events[0], (0, ActuatorOutput::Forward(75)));
    assert_eq!(events[1], (120, ActuatorOutput::Coast));
    assert!(handoff.outputs.actuator.is_neutral());
    assert_eq!(rig.clock_now(), 120);

    assert_eq!(rig.to_input.try_recv(), Ok(ControlMessage::EmergencyShutdown));
    assert_eq!(rig.to_wireless.try_recv(), Ok(ControlMessage::EmergencyShutdown));
}

#[test]
fn mode_change_during_sampling_drops_the_partial_triple() {
    // 245 ms lands in the margin wait, 255 ms in the settle wait
    for at in [245, 255] {
        let mut rig = rig();
        let inbox = ScriptedInbox::new(rig.clock.clone())
            .with_message(at, ControlMessage::ModeChanged(CATALOG[0]))
            .with_message(1_000, ControlMessage::EmergencyShutdown);
        let (_, samples) = run(&mut rig, inbox, LiveTuning::default());

        assert!(!samples.is_empty(), "interrupt at {at} ms");
        assert!(samples.iter().all(|s| s.drive_started_ms != 0), "interrupt at {at} ms");
        assert!(samples.iter().all(BackEmfSample::is_ordered));
    }
}

#[test]
fn settle_interrupt_restarts_sampling_on_the_new_drive() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone())
        .with_message(255, ControlMessage::ModeChanged(CATALOG[0]))
        .with_message(1_000, ControlMessage::EmergencyShutdown);
    let (_, samples) = run(&mut rig, inbox, LiveTuning::default());

    assert_eq!(samples[0].drive_started_ms, 255);
    assert_eq!(samples[0].direction, Direction::Forward);
}

#[test]
fn battery_critical_ends_the_session() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone()).with_message(
        1_730,
        ControlMessage::BatteryCritical {
            voltage: 3.15,
            percent: 0,
        },
    );
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    assert_eq!(
        handoff.reason,
        ShutdownReason::BatteryCritical {
            voltage: 3.15,
            percent: 0
        }
    );
    assert!(handoff.outputs.actuator.is_neutral());
    assert_eq!(rig.to_input.try_recv(), Ok(ControlMessage::EmergencyShutdown));
}

#[test]
fn battery_warning_does_not_interrupt() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone())
        .with_message(
            100,
            ControlMessage::BatteryWarning {
                voltage: 3.35,
                percent: 12,
            },
        )
        .with_message(1_100, ControlMessage::EmergencyShutdown);
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    // the first drive ran its full active time
    let events = handoff.outputs.actuator.events();
    assert!(events.contains(&(250, ActuatorOutput::Coast)));
    assert!(!events.contains(&(100, ActuatorOutput::Coast)));
}

// ============================================================================
// Mode changes
// ============================================================================

#[test]
fn rapid_mode_changes_coalesce_to_the_last() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone())
        .with_message(100, ControlMessage::ModeChanged(CATALOG[1]))
        .with_message(100, ControlMessage::ModeChanged(CATALOG[2]))
        .with_message(100, ControlMessage::ModeChanged(CATALOG[3]))
        .with_message(1_500, ControlMessage::EmergencyShutdown);
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    // 0.5Hz@25%: 250 ms drive, 750 ms coast per half-cycle
    assert_eq!(
        handoff.outputs.actuator.drives(),
        vec![
            (0, ActuatorOutput::Forward(75)),
            (100, ActuatorOutput::Forward(75)),
            (1_100, ActuatorOutput::Reverse(75)),
        ]
    );
    assert!(handoff
        .outputs
        .actuator
        .events()
        .contains(&(350, ActuatorOutput::Coast)));
    assert_eq!(rig.status.active_mode(), ModeId::HalfHzQuarter);
}

#[test]
fn custom_mode_uses_live_tuning() {
    let mut rig = rig();
    let mut tuning = LiveTuning::default();
    tuning.custom = tuning
        .custom
        .with_frequency_chz(200)
        .and_then(|c| c.with_duty_percent(50))
        .and_then(|c| c.with_intensity_percent(60))
        .unwrap();

    // the payload's timing is replaced by the controller's tuning
    let custom = CustomProfile::default().to_mode();
    let inbox = ScriptedInbox::new(rig.clock.clone())
        .with_message(0, ControlMessage::ModeChanged(custom))
        .with_message(900, ControlMessage::EmergencyShutdown);
    let (handoff, _) = run(&mut rig, inbox, tuning);

    // 2 Hz: 250 ms half-cycles, 125 ms of drive in each
    let drives = handoff.outputs.actuator.drives();
    assert_eq!(drives[0], (0, ActuatorOutput::Forward(60)));
    assert_eq!(drives[1], (250, ActuatorOutput::Reverse(60)));
    assert_eq!(drives[2], (500, ActuatorOutput::Forward(60)));
    assert!(handoff
        .outputs
        .actuator
        .events()
        .contains(&(125, ActuatorOutput::Coast)));
    assert_eq!(rig.status.active_mode(), ModeId::Custom);
}

#[test]
fn config_change_in_custom_mode_applies_on_the_next_drive() {
    let mut rig = rig();
    let mut softer = LiveTuning::default();
    softer.custom = softer.custom.with_intensity_percent(40).unwrap();

    let inbox = ScriptedInbox::new(rig.clock.clone())
        .with_message(0, ControlMessage::ModeChanged(CustomProfile::default().to_mode()))
        .with_message(130, ControlMessage::ConfigChanged(softer))
        .with_message(1_000, ControlMessage::EmergencyShutdown);
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    let events = handoff.outputs.actuator.events();
    assert_eq!(events[0], (0, ActuatorOutput::Forward(75)));
    assert!(events
        .windows(2)
        .any(|w| w == [(130, ActuatorOutput::Coast), (130, ActuatorOutput::Forward(40))]));
    assert!(events.contains(&(380, ActuatorOutput::Coast)));
    // nothing after the change runs at the old intensity
    assert!(events
        .iter()
        .filter(|(at, _)| *at >= 130)
        .all(|(_, out)| !matches!(out, ActuatorOutput::Forward(75) | ActuatorOutput::Reverse(75))));
}

// ============================================================================
// Session
// ============================================================================

#[test]
fn session_timeout_notifies_input() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone());
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    assert_eq!(handoff.reason, ShutdownReason::SessionTimeout);
    assert_eq!(rig.clock_now(), 1_200_000);
    assert_eq!(rig.status.session_elapsed_s(), 1_200);
    assert_eq!(rig.to_input.try_recv(), Ok(ControlMessage::SessionTimedOut));
    assert_eq!(rig.to_wireless.try_recv(), Ok(ControlMessage::EmergencyShutdown));
    assert!(handoff.outputs.actuator.is_neutral());
}

#[test]
fn last_minute_lights_the_indicator() {
    let mut rig = rig();
    let inbox = ScriptedInbox::new(rig.clock.clone());
    let (handoff, _) = run(&mut rig, inbox, LiveTuning::default());

    let lit = handoff.outputs.indicator.lit_at();
    assert!(lit.iter().any(|&at| at >= 1_140_000));
    assert!(!lit.iter().any(|&at| at > 10_000 && at < 1_140_000));
}

impl Rig {
    fn clock_now(&self) -> u64 {
        use bilateral_haptic::Clock;
        self.clock.now_ms()
    }
}
