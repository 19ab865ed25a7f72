//! Persisted device settings and the store they are written through.
use std::path::PathBuf;

use crate::error::{Result, SpineError};
use crate::measurement::Methodology;
use crate::sampler::{CHANNELS, Channel};

/// Methodology, arrow length and calibration, as kept between power cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    pub methodology: Methodology,
    /// Arrow length in 1/16 inch.
    pub arrow_length_sixteenths: u16,
    /// Raw units per gram per channel.
    pub scale_factors: [f32; CHANNELS],
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            methodology: Methodology::StandardSpineAt28,
            arrow_length_sixteenths: 464,
            scale_factors: [1.0; CHANNELS],
        }
    }
}

impl DeviceSettings {
    pub fn scale_factor(&self, channel: Channel) -> f32 {
        self.scale_factors[channel.index()]
    }
}

/// Non-volatile storage for `DeviceSettings`.
pub trait SettingsStore {
    /// Load stored settings; `None` when nothing was stored yet.
    fn load(&mut self) -> Result<Option<DeviceSettings>>;
    fn save(&mut self, settings: &DeviceSettings) -> Result<()>;
}

impl<T: SettingsStore + ?Sized> SettingsStore for Box<T> {
    fn load(&mut self) -> Result<Option<DeviceSettings>> {
        (**self).load()
    }
    fn save(&mut self, settings: &DeviceSettings) -> Result<()> {
        (**self).save(settings)
    }
}

/// TOML state file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SettingsStore for FileStore {
    fn load(&mut self) -> Result<Option<DeviceSettings>> {
        let state = spine_config::load_state(&self.path)
            .map_err(|e| eyre::Report::new(SpineError::Persistence(e.to_string())))?;
        Ok(state.as_ref().map(DeviceSettings::from))
    }

    fn save(&mut self, settings: &DeviceSettings) -> Result<()> {
        let state = spine_config::PersistedState::from(settings);
        spine_config::save_state(&self.path, &state)
            .map_err(|e| eyre::Report::new(SpineError::Persistence(e.to_string())))?;
        tracing::debug!(path = ?self.path, "settings saved");
        Ok(())
    }
}
