//! Edge case and boundary condition tests for the haptic control core

use bilateral_haptic::config::ButtonTiming;
use bilateral_haptic::hal::MockStore;
use bilateral_haptic::input::{ButtonMachine, InputEvent};
use bilateral_haptic::mode::{CUSTOM_DUTY_MAX, CUSTOM_DUTY_MIN, CUSTOM_FREQUENCY_MAX};
use bilateral_haptic::status::StatusBoard;
use bilateral_haptic::store::{
    decode_record, encode_record, ConfigStore, PersistedConfig, RECORD_CAPACITY, SCHEMA_SIGNATURE,
};
use bilateral_haptic::wireless::{ConfigRegisters, Field, RegisterError, RegisterValue, WriteEffect};
use bilateral_haptic::{ButtonState, CustomProfile, ModeId, Rgb};

// ============================================================================
// Config Store
// ============================================================================

#[test]
fn load_save_load_is_idempotent() {
    let config = PersistedConfig {
        frequency_chz: 150,
        duty_percent: 35,
        led_brightness: 25,
        session_duration_s: 3600,
        ..PersistedConfig::default()
    };
    let mut store = MockStore::with_config(&config);

    let first = store.load(SCHEMA_SIGNATURE).unwrap();
    store.save(&first, SCHEMA_SIGNATURE).unwrap();
    let bytes_once = store.bytes();
    store.save(&first, SCHEMA_SIGNATURE).unwrap();

    assert_eq!(store.bytes(), bytes_once);
    assert_eq!(store.load(SCHEMA_SIGNATURE), Some(config));
}

#[test]
fn empty_store_restores_defaults() {
    let mut store = MockStore::new();
    let regs = ConfigRegisters::restore(&mut store);
    assert_eq!(regs, ConfigRegisters::default());
    assert!(!regs.is_dirty());
}

#[test]
fn garbage_record_restores_defaults() {
    let mut store = MockStore::new();
    store.inject_bytes(b"{\"signature\":1,\"config\":");
    assert_eq!(store.load(SCHEMA_SIGNATURE), None);
    assert_eq!(ConfigRegisters::restore(&mut store), ConfigRegisters::default());
}

#[test]
fn foreign_signature_is_rejected() {
    let mut buf = [0u8; RECORD_CAPACITY];
    let len = encode_record(&PersistedConfig::default(), SCHEMA_SIGNATURE.wrapping_add(1), &mut buf).unwrap();
    assert_eq!(decode_record(&buf[..len], SCHEMA_SIGNATURE), None);
}

#[test]
fn out_of_range_record_is_rejected_whole() {
    // duty is valid, brightness is not: nothing from the record survives
    let config = PersistedConfig {
        duty_percent: 20,
        led_brightness: 99,
        ..PersistedConfig::default()
    };
    let mut store = MockStore::with_config(&config);
    let regs = ConfigRegisters::restore(&mut store);
    assert_eq!(regs.custom(), CustomProfile::default());
}

#[test]
fn encode_fails_cleanly_on_a_short_buffer() {
    let mut buf = [0u8; 8];
    assert!(encode_record(&PersistedConfig::default(), SCHEMA_SIGNATURE, &mut buf).is_err());
}

// ============================================================================
// Register table
// ============================================================================

#[test]
fn read_only_fields_reject_writes() {
    let mut regs = ConfigRegisters::default();
    assert_eq!(
        regs.write(Field::SessionTime, RegisterValue::U32(5)),
        Err(RegisterError::ReadOnly)
    );
    assert_eq!(
        regs.write(Field::BatteryLevel, RegisterValue::U8(50)),
        Err(RegisterError::ReadOnly)
    );
    assert!(!regs.is_dirty());
}

#[test]
fn duty_boundaries() {
    let mut regs = ConfigRegisters::default();
    assert_eq!(
        regs.write(Field::CustomDuty, RegisterValue::U8(CUSTOM_DUTY_MIN)),
        Ok(WriteEffect::Tuning)
    );
    assert_eq!(
        regs.write(Field::CustomDuty, RegisterValue::U8(CUSTOM_DUTY_MAX)),
        Ok(WriteEffect::Tuning)
    );
    assert_eq!(
        regs.write(Field::CustomDuty, RegisterValue::U8(CUSTOM_DUTY_MIN - 1)),
        Err(RegisterError::OutOfRange)
    );
    assert_eq!(
        regs.write(Field::CustomDuty, RegisterValue::U8(CUSTOM_DUTY_MAX + 1)),
        Err(RegisterError::OutOfRange)
    );
    assert_eq!(regs.custom().duty_percent(), CUSTOM_DUTY_MAX);
}

#[test]
fn rejected_write_leaves_value_and_dirty_flag() {
    let mut regs = ConfigRegisters::default();
    let before = regs.custom();
    assert_eq!(
        regs.write(
            Field::CustomFrequency,
            RegisterValue::U16(CUSTOM_FREQUENCY_MAX + 1)
        ),
        Err(RegisterError::OutOfRange)
    );
    assert_eq!(regs.custom(), before);
    assert!(!regs.is_dirty());
}

#[test]
fn wrong_type_is_a_mismatch() {
    let mut regs = ConfigRegisters::default();
    assert_eq!(
        regs.write(Field::CustomFrequency, RegisterValue::U8(100)),
        Err(RegisterError::TypeMismatch)
    );
    assert_eq!(
        regs.write(Field::LedRgb, RegisterValue::U32(0xFF0000)),
        Err(RegisterError::TypeMismatch)
    );
}

#[test]
fn mode_write_past_custom_is_out_of_range() {
    let mut regs = ConfigRegisters::default();
    assert_eq!(
        regs.write(Field::Mode, RegisterValue::U8(ModeId::Custom.index() + 1)),
        Err(RegisterError::OutOfRange)
    );
    assert_eq!(
        regs.write(Field::Mode, RegisterValue::U8(ModeId::Custom.index())),
        Ok(WriteEffect::SwitchMode(ModeId::Custom))
    );
}

#[test]
fn rgb_accepts_any_color() {
    let mut regs = ConfigRegisters::default();
    let color = Rgb::new(0, 0, 0);
    assert!(regs.write(Field::LedRgb, RegisterValue::Rgb(color)).is_ok());
    assert_eq!(
        regs.read(Field::LedRgb, &StatusBoard::default()),
        RegisterValue::Rgb(color)
    );
    assert!(regs.is_dirty());
}

#[test]
fn accepted_writes_persist_through_the_store() {
    let mut regs = ConfigRegisters::default();
    regs.write(Field::SessionDuration, RegisterValue::U32(5400)).unwrap();
    regs.write(Field::CustomIntensity, RegisterValue::U8(30)).unwrap();

    let mut store = MockStore::new();
    store.save(&regs.to_persisted(), SCHEMA_SIGNATURE).unwrap();

    let restored = ConfigRegisters::restore(&mut store);
    assert_eq!(restored.live_tuning(), regs.live_tuning());
    assert!(!restored.is_dirty());
}

// ============================================================================
// Button gestures
// ============================================================================

fn press_for(machine: &mut ButtonMachine, start: u64, held_ms: u64) -> Vec<InputEvent> {
    let mut events = Vec::new();
    let mut t = start;
    while t < start + held_ms {
        events.extend(machine.poll(true, t));
        t += 10;
    }
    let released_at = t;
    while t <= released_at + u64::from(ButtonTiming::default().debounce_ms) {
        events.extend(machine.poll(false, t));
        t += 10;
    }
    events
}

#[test]
fn bounce_shorter_than_debounce_is_ignored() {
    let mut machine = ButtonMachine::new(ButtonTiming::default());
    assert!(press_for(&mut machine, 0, 40).is_empty());
    assert_eq!(machine.state(), ButtonState::Idle);
}

#[test]
fn press_at_advertise_threshold_reenables_advertising() {
    let mut machine = ButtonMachine::new(ButtonTiming::default());
    assert_eq!(press_for(&mut machine, 0, 1_000), vec![InputEvent::ReenableAdvertising]);

    let mut machine = ButtonMachine::new(ButtonTiming::default());
    assert_eq!(press_for(&mut machine, 0, 990), vec![InputEvent::ShortPress]);
}

#[test]
fn release_during_countdown_cancels() {
    let mut machine = ButtonMachine::new(ButtonTiming::default());
    assert_eq!(
        press_for(&mut machine, 0, 4_000),
        vec![InputEvent::CountdownStarted, InputEvent::CountdownCancelled]
    );
    assert_eq!(machine.state(), ButtonState::Idle);
}

#[test]
fn full_hold_shuts_down_once() {
    let mut machine = ButtonMachine::new(ButtonTiming::default());
    let events = press_for(&mut machine, 0, 6_000);
    assert_eq!(events, vec![InputEvent::CountdownStarted, InputEvent::Shutdown]);
    assert!(machine.state().is_terminal());
    assert_eq!(machine.poll(true, 7_000), None);
}

#[test]
fn quiesced_machine_never_emits() {
    let mut machine = ButtonMachine::new(ButtonTiming::default());
    machine.quiesce();
    assert!(press_for(&mut machine, 0, 6_000).is_empty());
    assert_eq!(machine.state(), ButtonState::Quiesced);
}
