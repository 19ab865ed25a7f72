//! The instrument's main loop.
//!
//! One `tick()` samples both cells into the rolling buffer, polls the buttons,
//! dispatches at most one event, updates the active mode and redraws the display
//! when the rendered text changed. Nothing in here blocks except the sensor reads
//! and, between ticks, `Clock::sleep`.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use spine_traits::{ButtonInputs, Clock, Display, LoadCell, PowerManager};

use crate::buttons::{ButtonEvent, ButtonReader};
use crate::calibration::{CalOutcome, Calibrator};
use crate::config::SessionCfg;
use crate::error::{CalibrationAbort, Result};
use crate::hw_error::map_hw_error;
use crate::measurement::{
    PeakHistory, RotationalAverage, SupportSpacing, average_of_six, center_of_gravity,
    front_of_center,
};
use crate::sampler::{Channel, RollingBuffer};
use crate::screen::{self, ROWS, Screen};
use crate::settings::{DeviceSettings, SettingsStore};
use crate::util::{elapsed, ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    MeasuringSpine,
    Weighing,
    Calibrating,
    /// Showing the rotational average until confirm.
    Reviewing,
}

pub struct Session {
    pub(crate) buffer: RollingBuffer<Box<dyn LoadCell>>,
    pub(crate) buttons: ButtonReader<Box<dyn ButtonInputs>>,
    pub(crate) display: Box<dyn Display>,
    pub(crate) power: Option<Box<dyn PowerManager>>,
    pub(crate) store: Box<dyn SettingsStore>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) cfg: SessionCfg,
    pub(crate) spacing: SupportSpacing,
    pub(crate) settings: DeviceSettings,
    pub(crate) mode: Mode,
    pub(crate) peaks: PeakHistory,
    pub(crate) calibrator: Option<Calibrator>,
    pub(crate) review: Option<RotationalAverage>,
    pub(crate) notice: Option<&'static str>,
    /// Methodology screen stays up until this instant.
    pub(crate) overlay_until: Option<Instant>,
    pub(crate) method_changed: bool,
    pub(crate) last_event_at: Instant,
    pub(crate) last_method_press: Option<Instant>,
    pub(crate) dirty_since: Option<Instant>,
    pub(crate) shown: Screen,
    pub(crate) sleeps: u32,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("spacing", &self.spacing)
            .field("settings", &self.settings)
            .field("peaks", &self.peaks)
            .field("dirty", &self.dirty_since.is_some())
            .finish()
    }
}

impl Session {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn spacing(&self) -> SupportSpacing {
        self.spacing
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn peaks(&self) -> &PeakHistory {
        &self.peaks
    }

    /// Rotational average shown in `Reviewing`.
    pub fn review(&self) -> Option<&RotationalAverage> {
        self.review.as_ref()
    }

    pub fn calibrator(&self) -> Option<&Calibrator> {
        self.calibrator.as_ref()
    }

    pub fn buffer(&self) -> &RollingBuffer<Box<dyn LoadCell>> {
        &self.buffer
    }

    /// Text currently on the display.
    pub fn screen(&self) -> &[String] {
        &self.shown
    }

    /// Settings changed and not yet written to the store.
    pub fn has_config_changed(&self) -> bool {
        self.dirty_since.is_some()
    }

    /// Completed inactivity sleep cycles.
    pub fn sleeps(&self) -> u32 {
        self.sleeps
    }

    /// One loop iteration. Returns the button event handled in it, if any.
    pub fn tick(&mut self) -> Option<ButtonEvent> {
        let now = self.clock.now();
        // Calibration drives the cells directly.
        if self.mode != Mode::Calibrating {
            self.buffer.tick();
        }

        let event = self.buttons.poll(now);
        if let Some(e) = event {
            self.last_event_at = now;
            self.notice = None;
            self.dispatch(e, now);
        }

        if self.mode == Mode::MeasuringSpine && self.peaks.latch(self.buffer.total()) {
            tracing::debug!(peak_g = self.peaks.current(), "peak latched");
        }
        if self.overlay_until.is_some_and(|until| now >= until) {
            self.overlay_until = None;
        }

        self.maybe_save(now);
        if self.inactive(now) {
            self.sleep_cycle();
        }
        self.refresh(now);
        event
    }

    /// Tick until `stop` is set or `max_ticks` ticks ran, idling `tick` between
    /// iterations, then flush unsaved settings. Returns the number of ticks run.
    pub fn run(&mut self, max_ticks: Option<u64>, stop: &AtomicBool) -> Result<u64> {
        tracing::info!(
            tick_ms = ms(self.cfg.sampling.tick),
            spacing = self.spacing.label(),
            methodology = self.settings.methodology.label(),
            "session loop started"
        );
        let mut ticks = 0u64;
        while !stop.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| ticks < max) {
            self.tick();
            ticks += 1;
            self.clock.sleep(self.cfg.sampling.tick);
        }
        tracing::info!(ticks, missed_reads = self.buffer.missed_reads(), "session loop stopped");
        self.shutdown()?;
        Ok(ticks)
    }

    /// Abandon a calibration in progress and write pending settings.
    pub fn shutdown(&mut self) -> Result<()> {
        self.cancel_calibration(CalibrationAbort::Shutdown);
        if self.dirty_since.is_some() {
            self.store.save(&self.settings)?;
            self.dirty_since = None;
            tracing::info!("pending settings saved on shutdown");
        }
        Ok(())
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            tracing::info!(from = ?self.mode, to = ?mode, "mode change");
            self.mode = mode;
        }
    }

    fn dispatch(&mut self, event: ButtonEvent, now: Instant) {
        tracing::debug!(?event, mode = ?self.mode, "dispatch");
        match (self.mode, event) {
            (Mode::Calibrating, _) => self.calibration_event(event),
            (Mode::Reviewing, ButtonEvent::Confirm) => {
                self.review = None;
                self.set_mode(Mode::Idle);
            }
            (Mode::Reviewing, _) => {}
            (_, ButtonEvent::Confirm) => {
                self.buffer.zero();
                self.peaks.shift();
                self.set_mode(Mode::MeasuringSpine);
            }
            (_, ButtonEvent::FunctionAShort) => {
                self.buffer.zero();
                self.set_mode(Mode::Weighing);
            }
            (_, ButtonEvent::FunctionALong) => {
                self.calibrator = Some(Calibrator::start(
                    &self.settings,
                    &self.cfg.calibration,
                    self.cfg.sampling.calibrate_reads,
                    self.cfg.sampling.read_timeout,
                ));
                self.overlay_until = None;
                self.set_mode(Mode::Calibrating);
            }
            (_, ButtonEvent::FunctionBShort) => {
                self.review = average_of_six(self.peaks.readings());
                match &self.review {
                    Some(avg) => tracing::info!(
                        mean_g = avg.mean,
                        max_g = avg.max,
                        angle = avg.max_angle_deg,
                        error_percent = avg.error_percent,
                        "rotational average"
                    ),
                    None => tracing::info!("rotational average unavailable"),
                }
                self.set_mode(Mode::Reviewing);
            }
            (_, ButtonEvent::FunctionBLong) => self.methodology_press(now),
        }
    }

    fn methodology_press(&mut self, now: Instant) {
        let window = self.cfg.buttons.repress_window;
        let again = self
            .last_method_press
            .is_some_and(|t| !elapsed(now, t, window));
        self.last_method_press = Some(now);
        self.method_changed = again;
        if again {
            let next = self.settings.methodology.next();
            tracing::info!(from = self.settings.methodology.label(), to = next.label(), "methodology changed");
            self.settings.methodology = next;
            self.dirty_since = Some(now);
        }
        self.overlay_until = now.checked_add(window);
    }

    fn calibration_event(&mut self, event: ButtonEvent) {
        let Some(cal) = self.calibrator.as_mut() else {
            self.set_mode(Mode::Idle);
            return;
        };
        let outcome = cal.handle(
            event,
            self.buffer.cells_mut(),
            &mut self.settings,
            &mut *self.store,
        );
        self.finish_calibration(outcome);
    }

    fn cancel_calibration(&mut self, reason: CalibrationAbort) {
        let Some(cal) = self.calibrator.as_mut() else {
            return;
        };
        let outcome = cal.cancel(
            reason,
            self.buffer.cells_mut(),
            &mut self.settings,
            &mut *self.store,
        );
        self.finish_calibration(outcome);
    }

    fn finish_calibration(&mut self, outcome: CalOutcome) {
        match outcome {
            CalOutcome::Continue => {}
            CalOutcome::Completed => {
                self.calibrator = None;
                self.buffer.zero();
                self.notice = Some("Calibration done");
                self.set_mode(Mode::Idle);
            }
            CalOutcome::Aborted(reason) => {
                self.calibrator = None;
                self.buffer.zero();
                self.notice = Some("Calibration failed");
                self.set_mode(Mode::Idle);
                tracing::warn!(%reason, "calibration failed");
                // Redraw from a blank display.
                if let Err(e) = self.display.clear() {
                    tracing::warn!(error = %map_hw_error(e.as_ref()), "display clear failed");
                }
                self.shown.clear();
            }
        }
    }

    fn maybe_save(&mut self, now: Instant) {
        let Some(since) = self.dirty_since else {
            return;
        };
        if !elapsed(now, since, self.cfg.power.save_quiet) {
            return;
        }
        match self.store.save(&self.settings) {
            Ok(()) => {
                self.dirty_since = None;
                tracing::info!(methodology = self.settings.methodology.label(), "settings saved");
            }
            Err(e) => {
                // Retry after another quiet period.
                self.dirty_since = Some(now);
                tracing::error!(error = %e, "settings save failed");
            }
        }
    }

    fn inactive(&self, now: Instant) -> bool {
        match self.cfg.power.inactivity {
            Some(timeout) if self.power.is_some() => {
                elapsed(now, self.last_event_at, timeout) && !self.buttons.any_held()
            }
            _ => false,
        }
    }

    fn sleep_cycle(&mut self) {
        tracing::info!(mode = ?self.mode, "inactivity timeout; entering sleep");
        self.cancel_calibration(CalibrationAbort::Inactive);
        if self.dirty_since.is_some() {
            match self.store.save(&self.settings) {
                Ok(()) => self.dirty_since = None,
                Err(e) => tracing::error!(error = %e, "settings save before sleep failed"),
            }
        }
        self.buffer.power_down();
        if let Err(e) = self.display.clear() {
            tracing::warn!(error = %map_hw_error(e.as_ref()), "display clear failed");
        }
        self.shown.clear();
        if let Some(power) = self.power.as_mut() {
            if let Err(e) = power.sleep_until_wake() {
                tracing::warn!(error = %map_hw_error(e.as_ref()), "sleep failed; continuing awake");
            }
        }
        self.buffer.power_up();
        self.sleeps = self.sleeps.saturating_add(1);
        let now = self.clock.now();
        // The press that woke us must not also act as a command.
        self.buttons.resync(now);
        self.last_event_at = now;
        tracing::info!("woke from sleep");
    }

    fn render(&self, now: Instant) -> Screen {
        let methodology = self.settings.methodology;
        if self.overlay_until.is_some_and(|until| now < until) {
            return screen::methodology(methodology, self.method_changed);
        }
        match self.mode {
            Mode::Idle => screen::idle(methodology, self.spacing, self.notice),
            Mode::MeasuringSpine => screen::spine(self.peaks.current(), methodology, self.spacing),
            Mode::Weighing => {
                let a = self.buffer.average(Channel::A);
                let b = self.buffer.average(Channel::B);
                let cog = center_of_gravity(a, b, self.spacing);
                let foc = front_of_center(cog, self.settings.arrow_length_sixteenths, self.spacing);
                screen::weighing(a + b, cog, foc)
            }
            Mode::Calibrating => self
                .calibrator
                .as_ref()
                .map(|c| screen::calibration(c.channel(), c.step(), c.reference_grams()))
                .unwrap_or_default(),
            Mode::Reviewing => screen::rotational(self.review.as_ref()),
        }
    }

    pub(crate) fn refresh(&mut self, now: Instant) {
        let next = self.render(now);
        if next == self.shown {
            return;
        }
        for row in 0..ROWS {
            let result = match next.get(usize::from(row)) {
                Some(line) => self.display.show_line(row, line),
                None => self.display.clear_row(row),
            };
            if let Err(e) = result {
                tracing::warn!(row, error = %map_hw_error(e.as_ref()), "display write failed");
            }
        }
        self.shown = next;
    }
}
