use std::time::Duration;

use rstest::rstest;
use spine_core::error::BuildError;
use spine_core::mocks::{MemoryStore, MockButtons, MockCell, MockSwitch, RecordingDisplay};
use spine_core::{DeviceSettings, Session, SessionCfg, SupportSpacing};
use spine_traits::clock::test_clock::TestClock;

#[rstest]
fn missing_load_cells_yields_typed_build_error() {
    let err = Session::builder()
        .with_buttons(MockButtons::new())
        .with_display(RecordingDisplay::new(4))
        .with_store(MemoryStore::new())
        .try_build()
        .expect_err("should fail with MissingLoadCells");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingLoadCells) => {}
        other => panic!("expected MissingLoadCells, got: {other:?}"),
    }
}

#[rstest]
fn missing_store_yields_typed_build_error() {
    let err = Session::builder()
        .with_load_cells(MockCell::new(), MockCell::new())
        .with_buttons(MockButtons::new())
        .with_display(RecordingDisplay::new(4))
        .build()
        .expect_err("should fail with MissingStore");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingStore)
    ));
}

#[rstest]
#[case::empty_window(|c: &mut SessionCfg| c.sampling.cell_reads = 0)]
#[case::huge_window(|c: &mut SessionCfg| c.sampling.cell_reads = 65)]
#[case::no_calibration_samples(|c: &mut SessionCfg| c.sampling.calibrate_reads = 0)]
#[case::zero_read_timeout(|c: &mut SessionCfg| c.sampling.read_timeout = Duration::ZERO)]
#[case::slow_tick(|c: &mut SessionCfg| c.sampling.tick = Duration::from_secs(2))]
#[case::long_press_below_debounce(|c: &mut SessionCfg| c.buttons.long_press = c.buttons.debounce)]
#[case::zero_reference(|c: &mut SessionCfg| c.calibration.reference_grams = 0.0)]
#[case::nan_reference(|c: &mut SessionCfg| c.calibration.reference_grams = f32::NAN)]
fn invalid_config_is_rejected(#[case] tweak: fn(&mut SessionCfg)) {
    let mut cfg = SessionCfg::default();
    tweak(&mut cfg);
    let err = Session::builder()
        .with_load_cells(MockCell::new(), MockCell::new())
        .with_buttons(MockButtons::new())
        .with_display(RecordingDisplay::new(4))
        .with_store(MemoryStore::new())
        .with_clock(TestClock::new())
        .with_config(cfg)
        .build()
        .expect_err("invalid config");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn unusable_stored_factors_fall_back_to_identity() {
    let store = MemoryStore::with(DeviceSettings {
        scale_factors: [f32::NAN, 5.0],
        ..DeviceSettings::default()
    });
    let session = Session::builder()
        .with_load_cells(MockCell::new(), MockCell::new())
        .with_buttons(MockButtons::new())
        .with_display(RecordingDisplay::new(4))
        .with_store(store)
        .with_clock(TestClock::new())
        .build()
        .unwrap();
    assert_eq!(session.settings().scale_factors, [1.0, 5.0]);
}

#[rstest]
#[case(true, SupportSpacing::Long28)]
#[case(false, SupportSpacing::Short23)]
fn spacing_switch_is_sampled_at_build(#[case] long: bool, #[case] expected: SupportSpacing) {
    let session = Session::builder()
        .with_load_cells(MockCell::new(), MockCell::new())
        .with_buttons(MockButtons::new())
        .with_display(RecordingDisplay::new(4))
        .with_spacing_switch(MockSwitch::new(long))
        .with_store(MemoryStore::new())
        .with_clock(TestClock::new())
        .build()
        .unwrap();
    assert_eq!(session.spacing(), expected);
}
