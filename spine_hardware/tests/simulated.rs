use std::time::Duration;

use rstest::rstest;
use spine_hardware::{FixedSwitch, Press, SIM_RAW_PER_GRAM, ScriptedButtons, SimulatedCell};
use spine_traits::clock::test_clock::TestClock;
use spine_traits::{Button, ButtonInputs, LoadCell, SpacingSwitch};

#[rstest]
#[case(0.0)]
#[case(12.5)]
#[case(1000.0)]
fn calibrated_cell_reports_grams(#[case] grams: f32) {
    let mut cell = SimulatedCell::new();
    let load = cell.handle();
    cell.tare(10).unwrap();
    cell.set_scale(SIM_RAW_PER_GRAM);

    load.set_grams(grams);
    let g = cell.read(Duration::from_millis(10)).unwrap();
    assert!((g - grams).abs() < 1e-2, "read {g}, expected {grams}");
}

#[test]
fn load_can_change_from_another_thread() {
    let mut cell = SimulatedCell::new();
    cell.tare(1).unwrap();
    cell.set_scale(SIM_RAW_PER_GRAM);
    let load = cell.handle();
    std::thread::spawn(move || load.set_grams(250.0)).join().unwrap();
    let g = cell.read(Duration::ZERO).unwrap();
    assert!((g - 250.0).abs() < 1e-2);
}

#[test]
fn tare_fails_when_a_read_times_out() {
    let mut cell = SimulatedCell::new();
    cell.handle().fail_next(1);
    assert!(cell.tare(5).is_err());
}

#[test]
fn long_press_stays_down_until_released() {
    let clock = TestClock::new();
    let (mut buttons, tx) = ScriptedButtons::new(clock.clone());
    tx.send(Press::long(Button::FunctionB)).unwrap();

    assert!(buttons.is_pressed(Button::FunctionB));
    clock.advance(Press::LONG - Duration::from_millis(10));
    assert!(buttons.is_pressed(Button::FunctionB));
    assert!(!buttons.is_pressed(Button::FunctionA));
    clock.advance(Duration::from_millis(10));
    assert!(!buttons.is_pressed(Button::FunctionB));
}

#[test]
fn nothing_is_pressed_without_a_script() {
    let (mut buttons, tx) = ScriptedButtons::new(TestClock::new());
    drop(tx);
    assert!(Button::ALL.iter().all(|&b| !buttons.is_pressed(b)));
}

#[rstest]
#[case(true)]
#[case(false)]
fn fixed_switch_reports_its_position(#[case] long: bool) {
    assert_eq!(FixedSwitch(long).is_long_spacing(), long);
}
