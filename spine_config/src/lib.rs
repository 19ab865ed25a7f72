#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and persisted device state for the spine tester.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated. Every
//!   section is optional; absent sections take the instrument defaults.
//! - `PersistedState` is the small state file written by the instrument itself
//!   (methodology, arrow length, per-channel scale factors).
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub hx711_a_dt: u8,
    pub hx711_a_sck: u8,
    pub hx711_b_dt: u8,
    pub hx711_b_sck: u8,
    pub button_confirm: u8,
    pub button_a: u8,
    pub button_b: u8,
    pub spacing_switch: u8,
    /// Buttons and switch pull the line low when active
    pub active_low: bool,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            hx711_a_dt: 5,
            hx711_a_sck: 6,
            hx711_b_dt: 16,
            hx711_b_sck: 20,
            button_confirm: 17,
            button_a: 27,
            button_b: 22,
            spacing_switch: 23,
            active_low: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sampling {
    /// Rolling window length per channel
    pub cell_reads: usize,
    /// Samples averaged per calibration tare/measure step
    pub calibrate_reads: u32,
    /// Max wait for one sensor sample (ms)
    pub read_timeout_ms: u64,
    /// Idle time between loop ticks (ms)
    pub tick_ms: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            cell_reads: 10,
            calibrate_reads: 20,
            read_timeout_ms: 1000,
            tick_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Buttons {
    /// A level must hold this long to count as a stable transition
    pub debounce_ms: u64,
    /// Presses held longer than this emit the long event
    pub long_press_ms: u64,
    /// A second long press on B within this window cycles the methodology
    pub repress_window_ms: u64,
}

impl Default for Buttons {
    fn default() -> Self {
        Self {
            debounce_ms: 30,
            long_press_ms: 800,
            repress_window_ms: 4000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Power {
    /// Sleep after this long without a button event (0 disables)
    pub inactivity_ms: u64,
}

impl Default for Power {
    fn default() -> Self {
        Self {
            inactivity_ms: 300_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Persistence {
    pub state_file: String,
    /// Changed settings are written once nothing changed for this long
    pub save_quiet_ms: u64,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            state_file: "spine_state.toml".to_string(),
            save_quiet_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Mass of the reference weight used during calibration
    pub reference_grams: f32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            reference_grams: 1000.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayCfg {
    pub rows: u8,
    pub columns: u8,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self { rows: 4, columns: 20 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub sampling: Sampling,
    pub buttons: Buttons,
    pub power: Power,
    pub persistence: Persistence,
    pub calibration: CalibrationCfg,
    pub display: DisplayCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sampling
        if self.sampling.cell_reads == 0 {
            eyre::bail!("sampling.cell_reads must be >= 1");
        }
        if self.sampling.cell_reads > 64 {
            eyre::bail!("sampling.cell_reads must be <= 64");
        }
        if self.sampling.calibrate_reads == 0 {
            eyre::bail!("sampling.calibrate_reads must be >= 1");
        }
        if self.sampling.read_timeout_ms == 0 {
            eyre::bail!("sampling.read_timeout_ms must be >= 1");
        }
        if self.sampling.tick_ms > 1000 {
            eyre::bail!("sampling.tick_ms is unreasonably large (>1s)");
        }

        // Buttons
        if self.buttons.debounce_ms == 0 {
            eyre::bail!("buttons.debounce_ms must be >= 1");
        }
        if self.buttons.long_press_ms <= self.buttons.debounce_ms {
            eyre::bail!("buttons.long_press_ms must be greater than buttons.debounce_ms");
        }

        // Persistence
        if self.persistence.state_file.trim().is_empty() {
            eyre::bail!("persistence.state_file must not be empty");
        }

        // Calibration
        if !(self.calibration.reference_grams.is_finite() && self.calibration.reference_grams > 0.0)
        {
            eyre::bail!("calibration.reference_grams must be > 0");
        }

        // Display
        if self.display.rows < 4 {
            eyre::bail!("display.rows must be >= 4");
        }
        if self.display.columns < 16 {
            eyre::bail!("display.columns must be >= 16");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {r:?}");
        }

        Ok(())
    }
}

/// Measurement methodology as written in the state file.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Methodology {
    ForceUnits,
    #[default]
    StandardSpineAt28,
    AlternateSpineAt26,
    AlternatePoundageAt26,
}

/// Everything the instrument writes back between power cycles.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PersistedState {
    pub methodology: Methodology,
    pub arrow_length_sixteenths: u16,
    /// Raw units per gram, channel A then channel B
    pub scale_factors: [f32; 2],
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            methodology: Methodology::default(),
            arrow_length_sixteenths: 464,
            scale_factors: [1.0, 1.0],
        }
    }
}

impl PersistedState {
    pub fn validate(&self) -> eyre::Result<()> {
        if !(1..=1024).contains(&self.arrow_length_sixteenths) {
            eyre::bail!(
                "arrow_length_sixteenths must be in 1..=1024, got {}",
                self.arrow_length_sixteenths
            );
        }
        for (idx, f) in self.scale_factors.iter().enumerate() {
            if !(f.is_finite() && *f > 0.0) {
                eyre::bail!("scale_factors[{idx}] must be finite and > 0, got {f}");
            }
        }
        Ok(())
    }
}

/// Load the state file. A missing file is not an error and yields `None`.
pub fn load_state(path: &Path) -> eyre::Result<Option<PersistedState>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(eyre::eyre!("read state file {:?}: {}", path, e)),
    };
    let state: PersistedState =
        toml::from_str(&text).map_err(|e| eyre::eyre!("parse state file {:?}: {}", path, e))?;
    state.validate()?;
    Ok(Some(state))
}

/// Write the state file through a sibling temp file and rename, so a power loss
/// mid-write leaves the previous state intact.
pub fn save_state(path: &Path, state: &PersistedState) -> eyre::Result<()> {
    state.validate()?;
    let text = toml::to_string(state).map_err(|e| eyre::eyre!("encode state: {}", e))?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, text).map_err(|e| eyre::eyre!("write {:?}: {}", tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| eyre::eyre!("rename {:?} -> {:?}: {}", tmp, path, e))?;
    Ok(())
}
