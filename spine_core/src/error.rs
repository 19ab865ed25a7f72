use thiserror::Error;

use crate::buttons::ButtonEvent;
use crate::sampler::Channel;

#[derive(Debug, Error, Clone)]
pub enum SpineError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    SensorTimeout,
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing load cells")]
    MissingLoadCells,
    #[error("missing buttons")]
    MissingButtons,
    #[error("missing display")]
    MissingDisplay,
    #[error("missing settings store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Why a calibration run ended without new factors for every channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationAbort {
    #[error("calibration aborted by operator ({0:?})")]
    Operator(ButtonEvent),
    #[error("no samples from channel {0} during calibration")]
    NoSamples(Channel),
    #[error("tare failed on channel {0}")]
    TareFailed(Channel),
    /// Reference reading was zero, negative or not a number.
    #[error("channel {0} produced an unusable scale factor")]
    InvalidFactor(Channel),
    #[error("calibration abandoned after inactivity")]
    Inactive,
    #[error("calibration interrupted by shutdown")]
    Shutdown,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
