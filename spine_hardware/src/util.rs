use std::time::Duration;

use spine_traits::Clock;

use crate::error::{HwError, Result};

/// Poll interval while the HX711 holds DT high.
pub const DATA_READY_POLL: Duration = Duration::from_micros(200);

/// Block until the HX711 signals a finished conversion (`dt_high` turns false).
///
/// An HX711 at 10 SPS converts every 100 ms; a line still high after `timeout`
/// means the chip is unpowered, disconnected or powered down.
pub fn await_conversion<C: Clock + ?Sized>(
    clock: &C,
    mut dt_high: impl FnMut() -> bool,
    timeout: Duration,
) -> Result<()> {
    let start = clock.now();
    while dt_high() {
        if clock.has_elapsed(start, timeout) {
            return Err(HwError::DataReadyTimeout);
        }
        clock.sleep(DATA_READY_POLL);
    }
    Ok(())
}

/// Run `read`, repeating it up to `retries` more times while the data-ready wait
/// times out. Other errors and the final timeout are returned as is.
pub fn read_with_retries<T>(retries: u32, mut read: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match read() {
            Err(HwError::DataReadyTimeout) if attempt < retries => {
                attempt += 1;
                tracing::warn!(attempt, retries, "hx711 not ready, retrying");
            }
            other => return other,
        }
    }
}

/// Sign-extend a 24-bit two's complement sample as clocked out of the HX711.
#[inline]
pub fn decode_24bit(bits: u32) -> i32 {
    let v = (bits & 0x00FF_FFFF) as i32;
    if v & 0x0080_0000 != 0 { v | !0x00FF_FFFF } else { v }
}

/// Average `samples` successful values from `read`; the first error aborts.
pub fn average_of<F>(samples: u32, mut read: F) -> Result<f32>
where
    F: FnMut() -> Result<f32>,
{
    let n = samples.max(1);
    let mut sum = 0.0f64;
    for _ in 0..n {
        sum += f64::from(read()?);
    }
    Ok((sum / f64::from(n)) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use spine_traits::clock::test_clock::TestClock;

    #[rstest]
    // (polls before DT drops, timeout ms, ready?)
    #[case(0, 100, true)]
    #[case(5, 100, true)]
    #[case(499, 100, true)]
    #[case(501, 100, false)]
    #[case(usize::MAX, 0, false)]
    fn conversion_wait(#[case] high_polls: usize, #[case] timeout_ms: u64, #[case] ready: bool) {
        let clock = TestClock::new();
        let start = clock.now();
        let mut polls = 0usize;
        let res = await_conversion(
            &clock,
            || {
                polls += 1;
                polls <= high_polls
            },
            Duration::from_millis(timeout_ms),
        );
        if ready {
            assert!(res.is_ok(), "expected data ready, got {res:?}");
        } else {
            assert!(matches!(res, Err(HwError::DataReadyTimeout)));
            assert!(clock.since(start) >= Duration::from_millis(timeout_ms));
        }
    }

    #[rstest]
    // (timeouts before a sample, retries, succeeds?)
    #[case(0, 0, true)]
    #[case(2, 2, true)]
    #[case(3, 2, false)]
    fn data_ready_timeouts_are_retried(
        #[case] timeouts: u32,
        #[case] retries: u32,
        #[case] succeeds: bool,
    ) {
        let mut calls = 0;
        let res = read_with_retries(retries, || {
            calls += 1;
            if calls <= timeouts { Err(HwError::DataReadyTimeout) } else { Ok(8400) }
        });
        assert_eq!(res.is_ok(), succeeds);
        assert_eq!(calls, timeouts.min(retries) + 1);
        if !succeeds {
            assert!(matches!(res, Err(HwError::DataReadyTimeout)));
        }
    }

    #[test]
    fn powered_down_cell_is_not_retried() {
        let mut calls = 0;
        let res: Result<i32> = read_with_retries(5, || {
            calls += 1;
            Err(HwError::PoweredDown)
        });
        assert!(matches!(res, Err(HwError::PoweredDown)));
        assert_eq!(calls, 1);
    }

    #[rstest]
    #[case(0x00_0000, 0)]
    #[case(0x00_0001, 1)]
    #[case(0x7F_FFFF, 8_388_607)]
    #[case(0x80_0000, -8_388_608)]
    #[case(0xFF_FFFF, -1)]
    #[case(0xFF00_0001, 1)]
    fn decodes_twos_complement(#[case] bits: u32, #[case] expected: i32) {
        assert_eq!(decode_24bit(bits), expected);
    }

    #[test]
    fn average_propagates_first_error() {
        let mut n = 0;
        let res = average_of(4, || {
            n += 1;
            if n == 3 { Err(HwError::Timeout) } else { Ok(1.0) }
        });
        assert!(matches!(res, Err(HwError::Timeout)));
    }

    #[test]
    fn average_of_constant_is_constant() {
        assert_eq!(average_of(10, || Ok(2.5)).unwrap(), 2.5);
    }
}
