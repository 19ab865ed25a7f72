//! Configuration types for the session engine.
//!
//! These are the runtime configuration structs used by `Session`.
//! They are separate from the TOML-deserialized config in `spine_config`.
use std::time::Duration;

/// Sampling cadence and window sizes.
#[derive(Debug, Clone)]
pub struct SamplingCfg {
    /// Rolling window length per channel (CELLREADS).
    pub cell_reads: usize,
    /// Samples per calibration tare and measurement (CELLREADSCALIBRATE).
    pub calibrate_reads: u32,
    /// Max sensor wait per read.
    pub read_timeout: Duration,
    /// Idle time between ticks and between polls while waiting for a button.
    pub tick: Duration,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            cell_reads: 10,
            calibrate_reads: 20,
            read_timeout: Duration::from_millis(1000),
            tick: Duration::from_millis(10),
        }
    }
}

/// Button timing.
#[derive(Debug, Clone)]
pub struct ButtonCfg {
    /// Level must hold this long before a transition is accepted.
    pub debounce: Duration,
    /// Presses held longer than this are long presses.
    pub long_press: Duration,
    /// Window for the second B-long press that cycles the methodology.
    pub repress_window: Duration,
}

impl Default for ButtonCfg {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(30),
            long_press: Duration::from_millis(800),
            repress_window: Duration::from_millis(4000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Mass of the reference weight in grams.
    pub reference_grams: f32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            reference_grams: 1000.0,
        }
    }
}

/// Inactivity sleep and lazy settings persistence.
#[derive(Debug, Clone)]
pub struct PowerCfg {
    /// Sleep after this long without a button event; `None` disables.
    pub inactivity: Option<Duration>,
    /// Changed settings are saved after this quiet period.
    pub save_quiet: Duration,
}

impl Default for PowerCfg {
    fn default() -> Self {
        Self {
            inactivity: Some(Duration::from_secs(300)),
            save_quiet: Duration::from_secs(5),
        }
    }
}

/// Everything the session needs beyond its collaborators.
#[derive(Debug, Clone, Default)]
pub struct SessionCfg {
    pub sampling: SamplingCfg,
    pub buttons: ButtonCfg,
    pub calibration: CalibrationCfg,
    pub power: PowerCfg,
}
