//! Hardware adapters for the spine tester.
//!
//! Simulated collaborators are always available; HX711 and GPIO drivers need the
//! `hardware` feature on Linux.
pub mod error;
pub mod util;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use spine_traits::{
    Button, ButtonInputs, Clock, Display, HwError as TraitError, LoadCell, PowerManager,
    SpacingSwitch,
};

use crate::error::HwError;

/// Default raw counts per gram of the simulated bridge.
pub const SIM_RAW_PER_GRAM: f32 = 420.0;
/// Raw reading of the unloaded simulated bridge.
pub const SIM_ZERO_RAW: f32 = 8_400.0;

/// Handle for changing what rests on a `SimulatedCell`, usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct LoadHandle {
    grams_bits: Arc<AtomicU32>,
    fail_next: Arc<AtomicU32>,
}

impl LoadHandle {
    pub fn set_grams(&self, grams: f32) {
        self.grams_bits.store(grams.to_bits(), Ordering::Relaxed);
    }

    pub fn grams(&self) -> f32 {
        f32::from_bits(self.grams_bits.load(Ordering::Relaxed))
    }

    /// Make the next `n` reads time out.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::Relaxed);
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Load cell with a linear bridge: `raw = SIM_ZERO_RAW + grams * raw_per_gram`.
#[derive(Debug)]
pub struct SimulatedCell {
    load: LoadHandle,
    raw_per_gram: f32,
    offset: f32,
    scale: f32,
    powered: bool,
}

impl Default for SimulatedCell {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCell {
    pub fn new() -> Self {
        Self::with_sensitivity(SIM_RAW_PER_GRAM)
    }

    pub fn with_sensitivity(raw_per_gram: f32) -> Self {
        Self {
            load: LoadHandle::default(),
            raw_per_gram,
            offset: 0.0,
            scale: 1.0,
            powered: true,
        }
    }

    pub fn handle(&self) -> LoadHandle {
        self.load.clone()
    }

    fn raw(&self) -> Result<f32, HwError> {
        if !self.powered {
            return Err(HwError::PoweredDown);
        }
        if self.load.take_failure() {
            return Err(HwError::Timeout);
        }
        Ok(SIM_ZERO_RAW + self.load.grams() * self.raw_per_gram)
    }
}

impl LoadCell for SimulatedCell {
    fn read(&mut self, _timeout: Duration) -> Result<f32, TraitError> {
        let raw = self.raw()?;
        Ok((raw - self.offset) / self.scale)
    }

    fn tare(&mut self, samples: u32) -> Result<(), TraitError> {
        let offset = util::average_of(samples, || self.raw())?;
        self.offset = offset;
        Ok(())
    }

    fn set_scale(&mut self, factor: f32) {
        self.scale = factor;
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn power_down(&mut self) -> Result<(), TraitError> {
        self.powered = false;
        Ok(())
    }

    fn power_up(&mut self) -> Result<(), TraitError> {
        self.powered = true;
        Ok(())
    }
}

/// One scripted button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Press {
    pub button: Button,
    pub hold: Duration,
}

impl Press {
    pub const SHORT: Duration = Duration::from_millis(100);
    pub const LONG: Duration = Duration::from_millis(1200);

    pub fn short(button: Button) -> Self {
        Self {
            button,
            hold: Self::SHORT,
        }
    }

    pub fn long(button: Button) -> Self {
        Self {
            button,
            hold: Self::LONG,
        }
    }
}

/// Buttons driven by presses sent over a channel, timed on `clock`.
///
/// Presses are played one after another, each followed by a released gap long
/// enough for the debouncer to see the release.
pub struct ScriptedButtons<C: Clock> {
    rx: Receiver<Press>,
    clock: C,
    current: Option<(Button, Instant)>,
    idle_until: Option<Instant>,
    gap: Duration,
}

impl<C: Clock> ScriptedButtons<C> {
    pub fn new(clock: C) -> (Self, Sender<Press>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let buttons = Self {
            rx,
            clock,
            current: None,
            idle_until: None,
            gap: Duration::from_millis(100),
        };
        (buttons, tx)
    }

    fn advance(&mut self, now: Instant) {
        if let Some((button, until)) = self.current {
            if now < until {
                return;
            }
            tracing::trace!(?button, "scripted release");
            self.current = None;
            self.idle_until = now.checked_add(self.gap);
        }
        if self.idle_until.is_some_and(|t| now < t) {
            return;
        }
        match self.rx.try_recv() {
            Ok(p) => {
                tracing::debug!(button = ?p.button, hold_ms = p.hold.as_millis() as u64, "scripted press");
                self.current = now.checked_add(p.hold).map(|until| (p.button, until));
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }
    }
}

impl<C: Clock> ButtonInputs for ScriptedButtons<C> {
    fn is_pressed(&mut self, button: Button) -> bool {
        let now = self.clock.now();
        self.advance(now);
        self.current.is_some_and(|(b, _)| b == button)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedSwitch(pub bool);

impl SpacingSwitch for FixedSwitch {
    fn is_long_spacing(&mut self) -> bool {
        self.0
    }
}

/// Character display rendered as text lines on a writer.
///
/// Each changed row is written as `|row| text`, truncated to the column count.
pub struct TerminalDisplay<W: Write> {
    out: W,
    frame: Vec<String>,
    columns: usize,
}

impl TerminalDisplay<std::io::Stdout> {
    pub fn stdout(rows: u8, columns: u8) -> Self {
        Self::new(std::io::stdout(), rows, columns)
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, rows: u8, columns: u8) -> Self {
        Self {
            out,
            frame: vec![String::new(); usize::from(rows)],
            columns: usize::from(columns),
        }
    }

    pub fn frame(&self) -> &[String] {
        &self.frame
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn put(&mut self, row: u8, text: String) -> Result<(), HwError> {
        let Some(slot) = self.frame.get_mut(usize::from(row)) else {
            return Err(HwError::DisplayRow {
                row,
                rows: self.frame.len(),
            });
        };
        if *slot != text {
            writeln!(self.out, "|{row}| {text}")?;
            *slot = text;
        }
        Ok(())
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn show_line(&mut self, row: u8, text: &str) -> Result<(), TraitError> {
        let line: String = text.chars().take(self.columns).collect();
        Ok(self.put(row, line)?)
    }

    fn clear(&mut self) -> Result<(), TraitError> {
        for line in &mut self.frame {
            line.clear();
        }
        writeln!(self.out, "|-| ").map_err(HwError::from)?;
        Ok(())
    }

    fn clear_row(&mut self, row: u8) -> Result<(), TraitError> {
        Ok(self.put(row, String::new())?)
    }
}

/// Returns from sleep at once, logging the request.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPower {
    sleeps: Arc<AtomicU32>,
}

impl SimulatedPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> u32 {
        self.sleeps.load(Ordering::Relaxed)
    }
}

impl PowerManager for SimulatedPower {
    fn sleep_until_wake(&mut self) -> Result<(), TraitError> {
        self.sleeps.fetch_add(1, Ordering::Relaxed);
        tracing::info!("simulated sleep; waking immediately");
        Ok(())
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hardware {
    pub use crate::gpio::{GpioButtons, GpioSwitch, GpioWakePower};
    pub use crate::hx711::{GAIN_128_PULSES, Hx711, Hx711Cell};
}

#[cfg(test)]
mod tests {
    use super::*;
    use spine_traits::clock::test_clock::TestClock;

    #[test]
    fn simulated_cell_tares_and_scales() {
        let mut cell = SimulatedCell::new();
        let load = cell.handle();
        cell.tare(5).unwrap();
        assert_eq!(cell.read(Duration::ZERO).unwrap(), 0.0);

        load.set_grams(100.0);
        cell.set_scale(SIM_RAW_PER_GRAM);
        let g = cell.read(Duration::ZERO).unwrap();
        assert!((g - 100.0).abs() < 1e-3);
    }

    #[test]
    fn simulated_cell_injects_timeouts() {
        let mut cell = SimulatedCell::new();
        cell.handle().fail_next(1);
        let err = cell.read(Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert!(cell.read(Duration::ZERO).is_ok());
    }

    #[test]
    fn powered_down_cell_does_not_answer() {
        let mut cell = SimulatedCell::new();
        cell.power_down().unwrap();
        assert!(cell.read(Duration::ZERO).is_err());
        cell.power_up().unwrap();
        assert!(cell.read(Duration::ZERO).is_ok());
    }

    #[test]
    fn scripted_press_is_held_for_its_duration() {
        let clock = TestClock::new();
        let (mut buttons, tx) = ScriptedButtons::new(clock.clone());
        tx.send(Press::short(Button::FunctionA)).unwrap();
        tx.send(Press::short(Button::Confirm)).unwrap();

        assert!(buttons.is_pressed(Button::FunctionA));
        assert!(!buttons.is_pressed(Button::Confirm));
        clock.advance(Duration::from_millis(99));
        assert!(buttons.is_pressed(Button::FunctionA));
        clock.advance(Duration::from_millis(1));
        assert!(!buttons.is_pressed(Button::FunctionA));
        // Released gap before the next press.
        clock.advance(Duration::from_millis(50));
        assert!(!buttons.is_pressed(Button::Confirm));
        clock.advance(Duration::from_millis(50));
        assert!(buttons.is_pressed(Button::Confirm));
    }

    #[test]
    fn terminal_display_truncates_and_skips_unchanged_rows() {
        let mut display = TerminalDisplay::new(Vec::new(), 4, 8);
        display.show_line(0, "Arrow spine tester").unwrap();
        display.show_line(0, "Arrow spine tester").unwrap();
        display.show_line(1, "ok").unwrap();
        assert_eq!(display.frame()[0], "Arrow sp");
        let out = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(out, "|0| Arrow sp\n|1| ok\n");
    }

    #[test]
    fn terminal_display_rejects_rows_past_the_panel() {
        let mut display = TerminalDisplay::new(Vec::new(), 4, 20);
        let err = display.show_line(4, "x").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HwError>(),
            Some(HwError::DisplayRow { row: 4, rows: 4 })
        ));
        let err = display.clear_row(9).unwrap_err();
        assert_eq!(err.to_string(), "display row 9 outside 0..4");
        assert!(display.into_inner().is_empty());
    }
}
