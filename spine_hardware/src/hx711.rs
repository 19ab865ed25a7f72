use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use spine_traits::{HwError as TraitError, LoadCell, MonotonicClock};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::{average_of, await_conversion, decode_24bit, read_with_retries};

/// Channel A at gain 128: one extra clock pulse after the 24 data bits.
pub const GAIN_128_PULSES: u8 = 1;

pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    /// Clock pulses after the data bits selecting gain/channel for the next read.
    gain_pulses: u8,
}

impl Hx711 {
    pub fn new(gpio: &Gpio, dt_pin: u8, sck_pin: u8, gain_pulses: u8) -> Result<Self> {
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(format!("dt pin {dt_pin}: {e}")))?
            .into_input();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(format!("sck pin {sck_pin}: {e}")))?
            .into_output();
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses,
        })
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        await_conversion(&MonotonicClock, || dt.is_high(), timeout)?;

        let mut bits: u32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay();
            bits = (bits << 1) | u32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay();
        }
        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            spin_delay();
            self.sck.set_low();
            spin_delay();
        }

        let value = decode_24bit(bits);
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }

    /// Holding SCK high for more than 60 us powers the chip down.
    pub fn power_down(&mut self) {
        self.sck.set_low();
        self.sck.set_high();
        std::thread::sleep(Duration::from_micros(100));
    }

    pub fn power_up(&mut self) {
        self.sck.set_low();
    }
}

#[inline(always)]
fn spin_delay() {
    std::hint::spin_loop();
}

/// HX711 as a calibrated load cell: `(raw - offset) / scale`.
pub struct Hx711Cell {
    hx711: Hx711,
    offset: f32,
    scale: f32,
    retries: u32,
}

impl Hx711Cell {
    pub fn new(hx711: Hx711) -> Self {
        Self {
            hx711,
            offset: 0.0,
            scale: 1.0,
            retries: 0,
        }
    }

    /// Retry timed-out reads this many times before reporting the timeout.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn read_raw(&mut self, timeout: Duration) -> Result<f32> {
        let hx711 = &mut self.hx711;
        read_with_retries(self.retries, || hx711.read_with_timeout(timeout)).map(|raw| raw as f32)
    }
}

impl LoadCell for Hx711Cell {
    fn read(&mut self, timeout: Duration) -> std::result::Result<f32, TraitError> {
        let raw = self.read_raw(timeout)?;
        Ok((raw - self.offset) / self.scale)
    }

    fn tare(&mut self, samples: u32) -> std::result::Result<(), TraitError> {
        let timeout = Duration::from_secs(1);
        let offset = average_of(samples, || self.read_raw(timeout))?;
        self.offset = offset;
        tracing::debug!(offset = self.offset, samples, "hx711 tared");
        Ok(())
    }

    fn set_scale(&mut self, factor: f32) {
        self.scale = factor;
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn power_down(&mut self) -> std::result::Result<(), TraitError> {
        self.hx711.power_down();
        Ok(())
    }

    fn power_up(&mut self) -> std::result::Result<(), TraitError> {
        self.hx711.power_up();
        Ok(())
    }
}
