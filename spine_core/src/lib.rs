#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Arrow spine tester engine (hardware-agnostic).
//!
//! Two load cells hold an arrow on its supports; this crate turns their readings
//! into spine, weight and balance figures and runs the button-driven instrument
//! loop. All hardware goes through the `spine_traits` seams.
//!
//! ## Architecture
//!
//! - **Sampling**: fixed-window rolling average per channel (`sampler`)
//! - **Measurement**: methodology conversions, center of gravity, front of center,
//!   rotational average (`measurement`)
//! - **Buttons**: debounced short/long press events (`buttons`)
//! - **Calibration**: guided per-channel scale factor procedure (`calibration`)
//! - **Session**: the tick loop with its modes, inactivity sleep and lazy
//!   settings persistence (`session`, built through `builder`)
//!
//! Everything runs on one thread. The only blocking calls are the timeout-bounded
//! sensor reads and the idle sleep between ticks.

pub mod builder;
pub mod buttons;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod measurement;
pub mod mocks;
pub mod sampler;
pub mod screen;
pub mod session;
pub mod settings;
pub mod util;

pub use builder::SessionBuilder;
pub use buttons::{ButtonEvent, ButtonReader, sample_spacing_switch};
pub use calibration::{CalOutcome, CalStep, Calibrator};
pub use config::{ButtonCfg, CalibrationCfg, PowerCfg, SamplingCfg, SessionCfg};
pub use error::{BuildError, CalibrationAbort, Report, Result, SpineError};
pub use measurement::{
    Methodology, PeakHistory, RotationalAverage, SupportSpacing, average_of_six,
    center_of_gravity, force_to_spine, front_of_center,
};
pub use sampler::{CHANNELS, Channel, RollingBuffer};
pub use session::{Mode, Session};
pub use settings::{DeviceSettings, FileStore, SettingsStore};
