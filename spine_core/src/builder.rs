//! Type-state builder for `Session`.
//!
//! Load cells, buttons and the display must be provided before `build()` is
//! available. `try_build()` is always available and reports what is missing.

use std::marker::PhantomData;
use std::time::Duration;

use spine_traits::{
    ButtonInputs, Clock, Display, LoadCell, MonotonicClock, PowerManager, SpacingSwitch,
};

use crate::buttons::{ButtonReader, sample_spacing_switch};
use crate::config::SessionCfg;
use crate::error::{BuildError, Result};
use crate::measurement::{PeakHistory, SupportSpacing};
use crate::sampler::{CHANNELS, MAX_CELL_READS, RollingBuffer};
use crate::session::{Mode, Session};
use crate::settings::{DeviceSettings, SettingsStore};

/// Upper bound on the boot-time wait for the spacing switch to settle.
const SWITCH_SETTLE_MAX: Duration = Duration::from_secs(1);

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct SessionBuilder<C, B, D> {
    cells: Option<[Box<dyn LoadCell>; CHANNELS]>,
    buttons: Option<Box<dyn ButtonInputs>>,
    display: Option<Box<dyn Display>>,
    switch: Option<Box<dyn SpacingSwitch>>,
    power: Option<Box<dyn PowerManager>>,
    store: Option<Box<dyn SettingsStore>>,
    clock: Option<Box<dyn Clock>>,
    cfg: Option<SessionCfg>,
    _c: PhantomData<C>,
    _b: PhantomData<B>,
    _d: PhantomData<D>,
}

impl Default for SessionBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            cells: None,
            buttons: None,
            display: None,
            switch: None,
            power: None,
            store: None,
            clock: None,
            cfg: None,
            _c: PhantomData,
            _b: PhantomData,
            _d: PhantomData,
        }
    }
}

impl Session {
    /// Start building a Session.
    pub fn builder() -> SessionBuilder<Missing, Missing, Missing> {
        SessionBuilder::default()
    }
}

fn validate(cfg: &SessionCfg) -> Result<()> {
    let invalid = |msg| Err(eyre::Report::new(BuildError::InvalidConfig(msg)));
    if !(1..=MAX_CELL_READS).contains(&cfg.sampling.cell_reads) {
        return invalid("sampling.cell_reads must be in 1..=64");
    }
    if cfg.sampling.calibrate_reads == 0 {
        return invalid("sampling.calibrate_reads must be >= 1");
    }
    if cfg.sampling.read_timeout.is_zero() {
        return invalid("sampling.read_timeout must be > 0");
    }
    if cfg.sampling.tick > Duration::from_secs(1) {
        return invalid("sampling.tick must be <= 1s");
    }
    if cfg.buttons.debounce.is_zero() {
        return invalid("buttons.debounce must be > 0");
    }
    if cfg.buttons.long_press <= cfg.buttons.debounce {
        return invalid("buttons.long_press must exceed debounce");
    }
    let reference = cfg.calibration.reference_grams;
    if !reference.is_finite() || reference <= 0.0 {
        return invalid("calibration.reference_grams must be finite and > 0");
    }
    Ok(())
}

/// Stored settings, or defaults when nothing usable was stored.
fn load_settings(store: &mut dyn SettingsStore) -> DeviceSettings {
    let mut settings = match store.load() {
        Ok(Some(s)) => s,
        Ok(None) => {
            tracing::info!("no stored settings; using defaults");
            DeviceSettings::default()
        }
        Err(e) => {
            tracing::warn!(error = %e, "stored settings unreadable; using defaults");
            DeviceSettings::default()
        }
    };
    for (i, f) in settings.scale_factors.iter_mut().enumerate() {
        if !f.is_finite() || *f <= 0.0 {
            tracing::warn!(channel = i, factor = *f, "unusable scale factor replaced with 1.0");
            *f = 1.0;
        }
    }
    settings
}

impl<C, B, D> SessionBuilder<C, B, D> {
    fn retype<C2, B2, D2>(self) -> SessionBuilder<C2, B2, D2> {
        SessionBuilder {
            cells: self.cells,
            buttons: self.buttons,
            display: self.display,
            switch: self.switch,
            power: self.power,
            store: self.store,
            clock: self.clock,
            cfg: self.cfg,
            _c: PhantomData,
            _b: PhantomData,
            _d: PhantomData,
        }
    }

    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Session> {
        let cells = self
            .cells
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLoadCells))?;
        let buttons = self
            .buttons
            .ok_or_else(|| eyre::Report::new(BuildError::MissingButtons))?;
        let display = self
            .display
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDisplay))?;
        let mut store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg)?;

        let clock: Box<dyn Clock> = match self.clock {
            Some(c) => c,
            None => Box::new(MonotonicClock),
        };

        let spacing = match self.switch {
            Some(mut sw) => {
                sample_spacing_switch(&mut *sw, &*clock, cfg.buttons.debounce, SWITCH_SETTLE_MAX)
            }
            None => {
                tracing::debug!("no spacing switch; assuming long spacing");
                SupportSpacing::Long28
            }
        };

        let settings = load_settings(&mut *store);
        let mut cells = cells;
        for (cell, factor) in cells.iter_mut().zip(settings.scale_factors) {
            cell.set_scale(factor);
        }
        let mut buffer = RollingBuffer::new(cells, cfg.sampling.cell_reads, cfg.sampling.read_timeout);
        buffer.zero();

        let now = clock.now();
        let buttons = ButtonReader::new(buttons, cfg.buttons.clone(), now);
        tracing::info!(
            spacing = spacing.label(),
            methodology = settings.methodology.label(),
            arrow_length_sixteenths = settings.arrow_length_sixteenths,
            factors = ?settings.scale_factors,
            "session ready"
        );

        let mut session = Session {
            buffer,
            buttons,
            display,
            power: self.power,
            store,
            clock,
            cfg,
            spacing,
            settings,
            mode: Mode::Idle,
            peaks: PeakHistory::new(),
            calibrator: None,
            review: None,
            notice: None,
            overlay_until: None,
            method_changed: false,
            last_event_at: now,
            last_method_press: None,
            dirty_since: None,
            shown: Vec::new(),
            sleeps: 0,
        };
        session.refresh(now);
        Ok(session)
    }
}

/// Chainable setters that do not affect type-state.
impl<C, B, D> SessionBuilder<C, B, D> {
    pub fn with_spacing_switch(mut self, switch: impl SpacingSwitch + 'static) -> Self {
        self.switch = Some(Box::new(switch));
        self
    }
    /// Without a power manager the inactivity timer is off.
    pub fn with_power(mut self, power: impl PowerManager + 'static) -> Self {
        self.power = Some(Box::new(power));
        self
    }
    pub fn with_store(mut self, store: impl SettingsStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }
    pub fn with_config(mut self, cfg: SessionCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }
}

// Setters that advance type-state
impl<B, D> SessionBuilder<Missing, B, D> {
    pub fn with_load_cells(
        mut self,
        a: impl LoadCell + 'static,
        b: impl LoadCell + 'static,
    ) -> SessionBuilder<Set, B, D> {
        let a: Box<dyn LoadCell> = Box::new(a);
        let b: Box<dyn LoadCell> = Box::new(b);
        self.cells = Some([a, b]);
        self.retype()
    }
}

impl<C, D> SessionBuilder<C, Missing, D> {
    pub fn with_buttons(mut self, buttons: impl ButtonInputs + 'static) -> SessionBuilder<C, Set, D> {
        self.buttons = Some(Box::new(buttons));
        self.retype()
    }
}

impl<C, B> SessionBuilder<C, B, Missing> {
    pub fn with_display(mut self, display: impl Display + 'static) -> SessionBuilder<C, B, Set> {
        self.display = Some(Box::new(display));
        self.retype()
    }
}

impl SessionBuilder<Set, Set, Set> {
    /// Validate and build the Session. Only available when cells, buttons and display are set.
    pub fn build(self) -> Result<Session> {
        self.try_build()
    }
}
