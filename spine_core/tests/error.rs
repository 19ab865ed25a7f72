use std::error::Error;
use std::time::Duration;

use spine_core::error::{CalibrationAbort, SpineError};
use spine_core::hw_error::map_hw_error;
use spine_core::{ButtonEvent, Channel};

#[test]
fn io_timeouts_map_to_sensor_timeout() {
    let e: Box<dyn Error + Send + Sync> = Box::new(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        "hx711 data line timed out",
    ));
    assert!(matches!(map_hw_error(e.as_ref()), SpineError::SensorTimeout));
}

#[test]
fn other_failures_keep_their_message() {
    let e: Box<dyn Error + Send + Sync> = "gpio export failed".into();
    match map_hw_error(e.as_ref()) {
        SpineError::Hardware(msg) => assert_eq!(msg, "gpio export failed"),
        other => panic!("expected Hardware, got {other:?}"),
    }
}

#[test]
fn calibration_abort_messages_name_the_cause() {
    assert_eq!(
        CalibrationAbort::NoSamples(Channel::B).to_string(),
        "no samples from channel B during calibration"
    );
    assert!(
        CalibrationAbort::Operator(ButtonEvent::FunctionAShort)
            .to_string()
            .contains("FunctionAShort")
    );
}

#[test]
fn mock_cell_timeout_is_recoverable_in_the_buffer() {
    use spine_core::RollingBuffer;
    use spine_core::mocks::MockCell;

    let a = MockCell::new();
    let b = MockCell::new();
    a.set_load(5.0);
    let mut buf = RollingBuffer::new([a.clone(), b], 1, Duration::from_millis(5));
    buf.tick();
    a.fail_next(1);
    let fresh = buf.tick();
    assert_eq!(fresh[0], None);
    assert_eq!(buf.average(Channel::A), 5.0);
}

#[cfg(feature = "hardware-errors")]
#[test]
fn exhausted_hx711_retries_surface_as_sensor_timeout() {
    use spine_hardware::error::HwError;
    use spine_hardware::util::read_with_retries;

    let mut attempts = 0;
    let res: Result<f32, HwError> = read_with_retries(2, || {
        attempts += 1;
        Err(HwError::DataReadyTimeout)
    });
    assert_eq!(attempts, 3);

    let boxed: Box<dyn Error + Send + Sync> = Box::new(res.unwrap_err());
    assert!(matches!(map_hw_error(boxed.as_ref()), SpineError::SensorTimeout));
}
