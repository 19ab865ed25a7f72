//! Guided two-channel calibration.
//!
//! The procedure is a state machine advanced by button events from the session
//! loop, so sampling of buttons and the inactivity timer continue while the
//! operator handles weights. Per channel:
//!
//! `RemoveWeight --confirm--> (zero) PlaceReference --confirm--> (measure, compute,
//! persist) Verify --confirm--> next channel or done`
//!
//! Any event other than confirm aborts. The aborted channel's previous factor is
//! restored in the driver and, if the new factor was already written, in the store.
//! Channels that completed keep their new factors.
use spine_traits::LoadCell;

use crate::buttons::ButtonEvent;
use crate::config::CalibrationCfg;
use crate::error::CalibrationAbort;
use crate::hw_error::map_hw_error;
use crate::sampler::{CHANNELS, Channel};
use crate::settings::{DeviceSettings, SettingsStore};

/// Operator-facing step; transient work happens inside transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalStep {
    /// Waiting for an empty cell.
    RemoveWeight,
    /// Cell is zeroed; waiting for the reference weight.
    PlaceReference,
    /// New factor applied; showing the re-read mass.
    Verify { grams: f32 },
}

/// Result of feeding one event to the calibrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalOutcome {
    /// Waiting for the next confirm.
    Continue,
    /// Every channel calibrated.
    Completed,
    Aborted(CalibrationAbort),
}

#[derive(Debug, Clone)]
pub struct Calibrator {
    channel: Channel,
    step: CalStep,
    previous: [f32; CHANNELS],
    /// The current channel's new factor has been written to the store.
    persisted: bool,
    reference_grams: f32,
    samples: u32,
    read_timeout: std::time::Duration,
}

impl Calibrator {
    pub fn start(
        settings: &DeviceSettings,
        cfg: &CalibrationCfg,
        samples: u32,
        read_timeout: std::time::Duration,
    ) -> Self {
        tracing::info!(reference_grams = cfg.reference_grams, samples, "calibration started");
        Self {
            channel: Channel::A,
            step: CalStep::RemoveWeight,
            previous: settings.scale_factors,
            persisted: false,
            reference_grams: cfg.reference_grams,
            samples: samples.max(1),
            read_timeout,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn step(&self) -> CalStep {
        self.step
    }

    pub fn reference_grams(&self) -> f32 {
        self.reference_grams
    }

    pub fn handle<L: LoadCell>(
        &mut self,
        event: ButtonEvent,
        cells: &mut [L; CHANNELS],
        settings: &mut DeviceSettings,
        store: &mut dyn SettingsStore,
    ) -> CalOutcome {
        if event != ButtonEvent::Confirm {
            return self.abort(CalibrationAbort::Operator(event), cells, settings, store);
        }
        let i = self.channel.index();
        match self.step {
            CalStep::RemoveWeight => {
                let cell = &mut cells[i];
                cell.set_scale(1.0);
                if let Err(e) = cell.tare(self.samples) {
                    let err = map_hw_error(e.as_ref());
                    tracing::warn!(channel = %self.channel, error = %err, "calibration tare failed");
                    return self.abort(CalibrationAbort::TareFailed(self.channel), cells, settings, store);
                }
                tracing::debug!(channel = %self.channel, "channel zeroed");
                self.step = CalStep::PlaceReference;
                CalOutcome::Continue
            }
            CalStep::PlaceReference => {
                let Some(raw) = average_reads(&mut cells[i], self.samples, self.read_timeout) else {
                    return self.abort(CalibrationAbort::NoSamples(self.channel), cells, settings, store);
                };
                let factor = raw / self.reference_grams;
                if !factor.is_finite() || factor <= 0.0 {
                    tracing::warn!(channel = %self.channel, raw, "reference reading unusable");
                    return self.abort(CalibrationAbort::InvalidFactor(self.channel), cells, settings, store);
                }
                cells[i].set_scale(factor);
                settings.scale_factors[i] = factor;
                match store.save(settings) {
                    Ok(()) => self.persisted = true,
                    Err(e) => tracing::error!(channel = %self.channel, error = %e, "calibration not persisted"),
                }
                tracing::info!(channel = %self.channel, factor, "scale factor computed");
                let grams = average_reads(&mut cells[i], self.samples, self.read_timeout)
                    .unwrap_or(f32::NAN);
                self.step = CalStep::Verify { grams };
                CalOutcome::Continue
            }
            CalStep::Verify { grams } => {
                tracing::info!(channel = %self.channel, grams, "channel verified");
                self.persisted = false;
                match self.channel.next() {
                    Some(next) => {
                        self.channel = next;
                        self.step = CalStep::RemoveWeight;
                        CalOutcome::Continue
                    }
                    None => {
                        tracing::info!(factors = ?settings.scale_factors, "calibration completed");
                        CalOutcome::Completed
                    }
                }
            }
        }
    }

    /// End the run without an operator event, restoring the current channel.
    pub fn cancel<L: LoadCell>(
        &mut self,
        reason: CalibrationAbort,
        cells: &mut [L; CHANNELS],
        settings: &mut DeviceSettings,
        store: &mut dyn SettingsStore,
    ) -> CalOutcome {
        self.abort(reason, cells, settings, store)
    }

    fn abort<L: LoadCell>(
        &mut self,
        reason: CalibrationAbort,
        cells: &mut [L; CHANNELS],
        settings: &mut DeviceSettings,
        store: &mut dyn SettingsStore,
    ) -> CalOutcome {
        let i = self.channel.index();
        let previous = self.previous[i];
        cells[i].set_scale(previous);
        settings.scale_factors[i] = previous;
        if std::mem::take(&mut self.persisted) {
            if let Err(e) = store.save(settings) {
                tracing::error!(channel = %self.channel, error = %e, "rollback of scale factor not persisted");
            }
        }
        tracing::warn!(channel = %self.channel, %reason, "calibration aborted");
        CalOutcome::Aborted(reason)
    }
}

/// Mean of up to `samples` successful reads; `None` when every read failed.
fn average_reads<L: LoadCell>(cell: &mut L, samples: u32, timeout: std::time::Duration) -> Option<f32> {
    let mut sum = 0.0f64;
    let mut ok = 0u32;
    for _ in 0..samples {
        match cell.read(timeout) {
            Ok(v) if v.is_finite() => {
                sum += f64::from(v);
                ok += 1;
            }
            Ok(_) => {}
            Err(e) => {
                let err = map_hw_error(e.as_ref());
                tracing::debug!(error = %err, "calibration read missed");
            }
        }
    }
    (ok > 0).then(|| (sum / f64::from(ok)) as f32)
}
