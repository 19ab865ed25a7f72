//! Offline commands: conversions, state file editing, self-check.

use std::path::Path;
use std::time::Duration;

use serde_json::json;
use spine_core::measurement::{ROTATIONS, is_displayable};
use spine_core::{
    DeviceSettings, Methodology, SpineError, SupportSpacing, average_of_six, center_of_gravity,
    force_to_spine, front_of_center, screen,
};
use spine_traits::LoadCell;

use crate::cli::{MethodArg, StateCmd};

fn emit(json: bool, value: &serde_json::Value, lines: &[String]) {
    if json {
        println!("{value}");
    } else {
        for l in lines {
            println!("{l}");
        }
    }
}

fn method_name(m: Methodology) -> serde_json::Value {
    serde_json::to_value(spine_config::Methodology::from(m)).unwrap_or(serde_json::Value::Null)
}

fn spacing(short: bool) -> SupportSpacing {
    SupportSpacing::from_switch(!short)
}

pub fn convert(force_g: f32, method: MethodArg, short_spacing: bool, json: bool) {
    let m = Methodology::from(method);
    let s = spacing(short_spacing);
    let v = force_to_spine(force_g, m, s);
    let shown = screen::format_reading(force_g, m, s);
    let line = if shown.is_empty() {
        "out of range".to_string()
    } else {
        shown
    };
    emit(
        json,
        &json!({
            "force_g": force_g,
            "method": method_name(m),
            "spacing": s.label(),
            "value": is_displayable(v).then_some(v),
        }),
        &[line],
    );
}

pub fn cog(a_g: f32, b_g: f32, length: u16, short_spacing: bool, json: bool) {
    let s = spacing(short_spacing);
    let cog = center_of_gravity(a_g, b_g, s);
    let foc = front_of_center(cog, length, s);
    let total = a_g + b_g;
    emit(
        json,
        &json!({
            "total_g": total,
            "cog_mm": (cog > 0.0).then_some(cog),
            "foc_percent": foc,
            "spacing": s.label(),
            "arrow_length_sixteenths": length,
        }),
        &screen::weighing(total, cog, foc),
    );
}

pub fn average(peaks: &[f32], json: bool) -> eyre::Result<()> {
    let readings: [f32; ROTATIONS] = peaks.try_into().map_err(|_| {
        eyre::eyre!("--peaks needs exactly {ROTATIONS} values, got {}", peaks.len())
    })?;
    let avg = average_of_six(&readings);
    let value = match avg {
        Some(a) => json!({
            "mean_g": a.mean,
            "max_g": a.max,
            "max_angle_deg": a.max_angle_deg,
            "error_percent": a.error_percent,
        }),
        None => json!({ "mean_g": null }),
    };
    emit(json, &value, &screen::rotational(avg.as_ref()));
    Ok(())
}

fn persistence(e: &eyre::Report) -> eyre::Report {
    eyre::Report::new(SpineError::Persistence(e.to_string()))
}

fn load_or_default(path: &Path) -> eyre::Result<spine_config::PersistedState> {
    Ok(spine_config::load_state(path)
        .map_err(|e| persistence(&e))?
        .unwrap_or_default())
}

pub fn state(cmd: &StateCmd, path: &Path, json: bool) -> eyre::Result<()> {
    match cmd {
        StateCmd::Show => {
            let stored = spine_config::load_state(path).map_err(|e| persistence(&e))?;
            let source = if stored.is_some() { "file" } else { "defaults" };
            let state = stored.unwrap_or_default();
            if json {
                let mut v = serde_json::to_value(&state)?;
                v["source"] = json!(source);
                v["path"] = json!(path.display().to_string());
                println!("{v}");
            } else {
                println!("# {} ({source})", path.display());
                print!("{}", toml::to_string(&state)?);
            }
        }
        StateCmd::SetLength { sixteenths } => {
            let mut state = load_or_default(path)?;
            state.arrow_length_sixteenths = *sixteenths;
            state
                .validate()
                .map_err(|e| eyre::Report::new(SpineError::State(e.to_string())))?;
            spine_config::save_state(path, &state).map_err(|e| persistence(&e))?;
            tracing::info!(sixteenths, path = %path.display(), "arrow length saved");
            emit(
                json,
                &json!({ "arrow_length_sixteenths": sixteenths }),
                &[format!("arrow length set to {sixteenths}/16 in")],
            );
        }
        StateCmd::SetMethod { method } => {
            let mut state = load_or_default(path)?;
            let m = Methodology::from(*method);
            state.methodology = m.into();
            spine_config::save_state(path, &state).map_err(|e| persistence(&e))?;
            tracing::info!(methodology = m.label(), path = %path.display(), "methodology saved");
            emit(
                json,
                &json!({ "methodology": method_name(m) }),
                &[format!("methodology set to {}", m.label())],
            );
        }
    }
    Ok(())
}

/// Check one cell: two reads within the configured timeout.
fn check_cell(cell: &mut dyn LoadCell, timeout: Duration) -> Result<f32, String> {
    cell.read(timeout).map_err(|e| e.to_string())?;
    cell.read(timeout).map_err(|e| e.to_string())
}

pub fn self_check(
    cfg: &spine_config::Config,
    state_file: &Path,
    json: bool,
) -> eyre::Result<()> {
    let timeout = Duration::from_millis(cfg.sampling.read_timeout_ms);
    let stored = spine_config::load_state(state_file).map_err(|e| persistence(&e))?;
    let settings = stored.as_ref().map(DeviceSettings::from).unwrap_or_default();

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let (backend, long_spacing, cells) = {
        use spine_hardware::hardware::{GAIN_128_PULSES, GpioSwitch, Hx711, Hx711Cell};
        use spine_traits::SpacingSwitch;
        let p = &cfg.pins;
        let gpio = rppal::gpio::Gpio::new().map_err(|e| eyre::eyre!("open gpio: {e}"))?;
        let mut switch = GpioSwitch::new(&gpio, p.spacing_switch, p.active_low)?;
        let mut cells = Vec::new();
        for (dt, sck) in [(p.hx711_a_dt, p.hx711_a_sck), (p.hx711_b_dt, p.hx711_b_sck)] {
            let r = match Hx711::new(&gpio, dt, sck, GAIN_128_PULSES) {
                Ok(hx) => check_cell(&mut Hx711Cell::new(hx), timeout),
                Err(e) => Err(e.to_string()),
            };
            cells.push(r);
        }
        ("hardware", switch.is_long_spacing(), cells)
    };
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let (backend, long_spacing, cells) = {
        let mut cells = Vec::new();
        for _ in 0..2 {
            cells.push(check_cell(&mut spine_hardware::SimulatedCell::new(), timeout));
        }
        ("simulated", true, cells)
    };

    let spacing = SupportSpacing::from_switch(long_spacing);
    let failed = cells.iter().filter(|p| p.is_err()).count();
    let sensor = |r: &Result<f32, String>| match r {
        Ok(raw) => json!({ "ok": true, "raw": raw }),
        Err(e) => json!({ "ok": false, "error": e }),
    };
    let lines = vec![
        format!("backend: {backend}"),
        "config: ok".to_string(),
        format!(
            "state: {} ({})",
            state_file.display(),
            if stored.is_some() { "file" } else { "defaults" }
        ),
        format!("methodology: {}", settings.methodology.label()),
        format!("spacing: {}", spacing.label()),
        format!(
            "cell A: {}",
            cells[0].as_ref().map_or_else(|e| format!("FAIL {e}"), |_| "ok".to_string())
        ),
        format!(
            "cell B: {}",
            cells[1].as_ref().map_or_else(|e| format!("FAIL {e}"), |_| "ok".to_string())
        ),
    ];
    emit(
        json,
        &json!({
            "backend": backend,
            "config": "ok",
            "state_source": if stored.is_some() { "file" } else { "defaults" },
            "methodology": method_name(settings.methodology),
            "spacing": spacing.label(),
            "cells": [sensor(&cells[0]), sensor(&cells[1])],
        }),
        &lines,
    );
    if failed > 0 {
        return Err(eyre::Report::new(SpineError::HardwareFault(format!(
            "{failed} load cell(s) did not answer"
        ))));
    }
    Ok(())
}
