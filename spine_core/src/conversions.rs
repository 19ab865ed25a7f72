//! `From` implementations bridging `spine_config` types to `spine_core` types.

use std::time::Duration;

use crate::config::{ButtonCfg, CalibrationCfg, PowerCfg, SamplingCfg, SessionCfg};
use crate::measurement::Methodology;
use crate::settings::DeviceSettings;

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&spine_config::Sampling> for SamplingCfg {
    fn from(c: &spine_config::Sampling) -> Self {
        Self {
            cell_reads: c.cell_reads,
            calibrate_reads: c.calibrate_reads,
            read_timeout: Duration::from_millis(c.read_timeout_ms),
            tick: Duration::from_millis(c.tick_ms),
        }
    }
}

// ── ButtonCfg ────────────────────────────────────────────────────────────────

impl From<&spine_config::Buttons> for ButtonCfg {
    fn from(c: &spine_config::Buttons) -> Self {
        Self {
            debounce: Duration::from_millis(c.debounce_ms),
            long_press: Duration::from_millis(c.long_press_ms),
            repress_window: Duration::from_millis(c.repress_window_ms),
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&spine_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &spine_config::CalibrationCfg) -> Self {
        Self {
            reference_grams: c.reference_grams,
        }
    }
}

// ── SessionCfg ───────────────────────────────────────────────────────────────

impl From<&spine_config::Config> for SessionCfg {
    fn from(c: &spine_config::Config) -> Self {
        Self {
            sampling: (&c.sampling).into(),
            buttons: (&c.buttons).into(),
            calibration: (&c.calibration).into(),
            power: PowerCfg {
                inactivity: (c.power.inactivity_ms > 0)
                    .then(|| Duration::from_millis(c.power.inactivity_ms)),
                save_quiet: Duration::from_millis(c.persistence.save_quiet_ms),
            },
        }
    }
}

// ── Methodology ──────────────────────────────────────────────────────────────

impl From<spine_config::Methodology> for Methodology {
    fn from(m: spine_config::Methodology) -> Self {
        match m {
            spine_config::Methodology::ForceUnits => Methodology::ForceUnits,
            spine_config::Methodology::StandardSpineAt28 => Methodology::StandardSpineAt28,
            spine_config::Methodology::AlternateSpineAt26 => Methodology::AlternateSpineAt26,
            spine_config::Methodology::AlternatePoundageAt26 => Methodology::AlternatePoundageAt26,
        }
    }
}

impl From<Methodology> for spine_config::Methodology {
    fn from(m: Methodology) -> Self {
        match m {
            Methodology::ForceUnits => spine_config::Methodology::ForceUnits,
            Methodology::StandardSpineAt28 => spine_config::Methodology::StandardSpineAt28,
            Methodology::AlternateSpineAt26 => spine_config::Methodology::AlternateSpineAt26,
            Methodology::AlternatePoundageAt26 => spine_config::Methodology::AlternatePoundageAt26,
        }
    }
}

// ── DeviceSettings ───────────────────────────────────────────────────────────

impl From<&spine_config::PersistedState> for DeviceSettings {
    fn from(s: &spine_config::PersistedState) -> Self {
        Self {
            methodology: s.methodology.into(),
            arrow_length_sixteenths: s.arrow_length_sixteenths,
            scale_factors: s.scale_factors,
        }
    }
}

impl From<&DeviceSettings> for spine_config::PersistedState {
    fn from(s: &DeviceSettings) -> Self {
        Self {
            methodology: s.methodology.into(),
            arrow_length_sixteenths: s.arrow_length_sixteenths,
            scale_factors: s.scale_factors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_inactivity_disables_sleep() {
        let mut c = spine_config::Config::default();
        c.power.inactivity_ms = 0;
        let cfg = SessionCfg::from(&c);
        assert!(cfg.power.inactivity.is_none());
        assert_eq!(cfg.power.save_quiet, Duration::from_millis(5000));
    }

    #[test]
    fn defaults_agree_with_runtime_defaults() {
        let cfg = SessionCfg::from(&spine_config::Config::default());
        let rt = SessionCfg::default();
        assert_eq!(cfg.sampling.cell_reads, rt.sampling.cell_reads);
        assert_eq!(cfg.sampling.tick, rt.sampling.tick);
        assert_eq!(cfg.buttons.long_press, rt.buttons.long_press);
        assert_eq!(cfg.power.inactivity, rt.power.inactivity);
        assert_eq!(DeviceSettings::from(&spine_config::PersistedState::default()), DeviceSettings::default());
    }
}
