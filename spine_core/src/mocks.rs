//! Test doubles for the hardware seams and the settings store.
//!
//! Every mock shares its state between clones (`Rc<Cell<..>>`), so a test keeps one
//! handle while the session owns a boxed clone.
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use spine_traits::{Button, ButtonInputs, Display, HwError, LoadCell, PowerManager, SpacingSwitch};

use crate::error::{Result, SpineError};
use crate::settings::{DeviceSettings, SettingsStore};

#[derive(Debug)]
struct CellState {
    load_g: Cell<f32>,
    /// Raw units per gram of applied load.
    sensitivity: Cell<f32>,
    offset: Cell<f32>,
    scale: Cell<f32>,
    fail_next: Cell<u32>,
    tares: Cell<u32>,
    reads: Cell<u64>,
    powered_down: Cell<bool>,
}

/// Load cell whose raw output is `load * sensitivity`.
#[derive(Debug, Clone)]
pub struct MockCell {
    state: Rc<CellState>,
}

impl Default for MockCell {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCell {
    pub fn new() -> Self {
        Self::with_sensitivity(1.0)
    }

    pub fn with_sensitivity(raw_per_gram: f32) -> Self {
        Self {
            state: Rc::new(CellState {
                load_g: Cell::new(0.0),
                sensitivity: Cell::new(raw_per_gram),
                offset: Cell::new(0.0),
                scale: Cell::new(1.0),
                fail_next: Cell::new(0),
                tares: Cell::new(0),
                reads: Cell::new(0),
                powered_down: Cell::new(false),
            }),
        }
    }

    /// Mass currently resting on the cell.
    pub fn set_load(&self, grams: f32) {
        self.state.load_g.set(grams);
    }

    /// Make the next `n` reads time out.
    pub fn fail_next(&self, n: u32) {
        self.state.fail_next.set(n);
    }

    pub fn tares(&self) -> u32 {
        self.state.tares.get()
    }

    pub fn reads(&self) -> u64 {
        self.state.reads.get()
    }

    pub fn is_powered_down(&self) -> bool {
        self.state.powered_down.get()
    }

    fn raw(&self) -> f32 {
        self.state.load_g.get() * self.state.sensitivity.get()
    }
}

impl LoadCell for MockCell {
    fn read(&mut self, _timeout: Duration) -> std::result::Result<f32, HwError> {
        self.state.reads.set(self.state.reads.get() + 1);
        let pending = self.state.fail_next.get();
        if pending > 0 {
            self.state.fail_next.set(pending - 1);
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "mock cell timed out",
            )));
        }
        Ok((self.raw() - self.state.offset.get()) / self.state.scale.get())
    }

    fn tare(&mut self, _samples: u32) -> std::result::Result<(), HwError> {
        self.state.tares.set(self.state.tares.get() + 1);
        self.state.offset.set(self.raw());
        Ok(())
    }

    fn set_scale(&mut self, factor: f32) {
        self.state.scale.set(factor);
    }

    fn scale(&self) -> f32 {
        self.state.scale.get()
    }

    fn power_down(&mut self) -> std::result::Result<(), HwError> {
        self.state.powered_down.set(true);
        Ok(())
    }

    fn power_up(&mut self) -> std::result::Result<(), HwError> {
        self.state.powered_down.set(false);
        Ok(())
    }
}

/// Button levels set directly by the test.
#[derive(Debug, Clone, Default)]
pub struct MockButtons {
    levels: Rc<Cell<[bool; 3]>>,
}

impl MockButtons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, button: Button) {
        self.set(button, true);
    }

    pub fn release(&self, button: Button) {
        self.set(button, false);
    }

    fn set(&self, button: Button, level: bool) {
        let mut levels = self.levels.get();
        levels[slot(button)] = level;
        self.levels.set(levels);
    }
}

fn slot(button: Button) -> usize {
    match button {
        Button::Confirm => 0,
        Button::FunctionA => 1,
        Button::FunctionB => 2,
    }
}

impl ButtonInputs for MockButtons {
    fn is_pressed(&mut self, button: Button) -> bool {
        self.levels.get()[slot(button)]
    }
}

/// Spacing switch replaying a script of levels, one per read; the last level repeats.
#[derive(Debug, Clone)]
pub struct MockSwitch {
    levels: Vec<bool>,
    reads: usize,
}

impl MockSwitch {
    pub fn new(long: bool) -> Self {
        Self::scripted(vec![long])
    }

    pub fn scripted(levels: Vec<bool>) -> Self {
        Self { levels, reads: 0 }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Level returned by the most recent read.
    pub fn last_level(&self) -> Option<bool> {
        let i = self.reads.checked_sub(1)?;
        self.levels.get(i).or(self.levels.last()).copied()
    }
}

impl SpacingSwitch for MockSwitch {
    fn is_long_spacing(&mut self) -> bool {
        let level = self
            .levels
            .get(self.reads)
            .or(self.levels.last())
            .copied()
            .unwrap_or(true);
        self.reads += 1;
        level
    }
}

/// Display that keeps the current text of every row.
#[derive(Debug, Clone)]
pub struct RecordingDisplay {
    rows: Rc<RefCell<Vec<String>>>,
    clears: Rc<Cell<u32>>,
}

impl RecordingDisplay {
    pub fn new(rows: usize) -> Self {
        Self {
            rows: Rc::new(RefCell::new(vec![String::new(); rows])),
            clears: Rc::new(Cell::new(0)),
        }
    }

    pub fn row(&self, row: usize) -> String {
        self.rows.borrow().get(row).cloned().unwrap_or_default()
    }

    /// All rows joined with newlines.
    pub fn text(&self) -> String {
        self.rows.borrow().join("\n")
    }

    pub fn clears(&self) -> u32 {
        self.clears.get()
    }
}

impl Display for RecordingDisplay {
    fn show_line(&mut self, row: u8, text: &str) -> std::result::Result<(), HwError> {
        let mut rows = self.rows.borrow_mut();
        let slot = rows
            .get_mut(usize::from(row))
            .ok_or_else(|| format!("row {row} out of range"))?;
        *slot = text.to_owned();
        Ok(())
    }

    fn clear(&mut self) -> std::result::Result<(), HwError> {
        self.clears.set(self.clears.get() + 1);
        self.rows.borrow_mut().iter_mut().for_each(String::clear);
        Ok(())
    }

    fn clear_row(&mut self, row: u8) -> std::result::Result<(), HwError> {
        if let Some(slot) = self.rows.borrow_mut().get_mut(usize::from(row)) {
            slot.clear();
        }
        Ok(())
    }
}

/// Power manager that counts sleeps and wakes immediately.
#[derive(Debug, Clone, Default)]
pub struct CountingPower {
    sleeps: Rc<Cell<u32>>,
}

impl CountingPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> u32 {
        self.sleeps.get()
    }
}

impl PowerManager for CountingPower {
    fn sleep_until_wake(&mut self) -> std::result::Result<(), HwError> {
        self.sleeps.set(self.sleeps.get() + 1);
        Ok(())
    }
}

/// In-memory settings store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    stored: Rc<RefCell<Option<DeviceSettings>>>,
    saves: Rc<Cell<u32>>,
    fail_saves: Rc<Cell<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(settings: DeviceSettings) -> Self {
        let store = Self::default();
        *store.stored.borrow_mut() = Some(settings);
        store
    }

    pub fn stored(&self) -> Option<DeviceSettings> {
        self.stored.borrow().clone()
    }

    pub fn saves(&self) -> u32 {
        self.saves.get()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }
}

impl SettingsStore for MemoryStore {
    fn load(&mut self) -> Result<Option<DeviceSettings>> {
        Ok(self.stored.borrow().clone())
    }

    fn save(&mut self, settings: &DeviceSettings) -> Result<()> {
        if self.fail_saves.get() {
            return Err(eyre::Report::new(SpineError::Persistence(
                "memory store rejects writes".into(),
            )));
        }
        self.saves.set(self.saves.get() + 1);
        *self.stored.borrow_mut() = Some(settings.clone());
        Ok(())
    }
}
