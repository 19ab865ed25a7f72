//! Human-readable error descriptions and structured JSON error formatting.

use spine_core::error::{BuildError, SpineError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = find::<BuildError>(err) {
        return match be {
            BuildError::MissingLoadCells => {
                "What happened: No load cells were provided to the session.\nLikely causes: The HX711 adapters failed to initialize or were not wired into the builder.\nHow to fix: Ensure both cells are created and passed via with_load_cells(...).".to_string()
            }
            BuildError::MissingButtons => {
                "What happened: No buttons were provided to the session.\nLikely causes: Button pins failed to initialize.\nHow to fix: Check [pins] button_confirm, button_a and button_b.".to_string()
            }
            BuildError::MissingDisplay => {
                "What happened: No display was provided to the session.\nLikely causes: The display failed to initialize.\nHow to fix: Check the display wiring and [display] settings.".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No settings store was provided to the session.\nLikely causes: The state file location could not be determined.\nHow to fix: Set persistence.state_file or pass --state FILE.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(se) = find::<SpineError>(err) {
        return match se {
            SpineError::SensorTimeout => "What happened: Load cell read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing sampling.read_timeout_ms in the config.".to_string(),
            SpineError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            SpineError::Persistence(msg) => format!(
                "What happened: Device state could not be read or written ({msg}).\nLikely causes: Corrupt state file, read-only directory or full disk.\nHow to fix: Check the path and permissions of the state file; delete it to start from defaults."
            ),
            SpineError::State(msg) => format!(
                "What happened: Device state is invalid ({msg}).\nLikely causes: A value outside its allowed range.\nHow to fix: Use `spine state show` to inspect and the `state set-*` commands to correct it."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: Wiring, power or GPIO permissions.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from hardware init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open hx711")
        || lower.contains("open button pins")
        || lower.contains("open spacing switch")
        || lower.contains("open gpio")
    {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("timeout") {
        return "What happened: A sensor did not answer within the configured timeout.\nLikely causes: Wiring or power issues, or timeout configured too low.\nHow to fix: Check [pins] in the config, verify 5V/GND, and raise sampling.read_timeout_ms.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.chain().nth(1) {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn find<'a, E: std::error::Error + Send + Sync + 'static>(err: &'a eyre::Report) -> Option<&'a E> {
    err.chain().find_map(|e| e.downcast_ref::<E>())
}

/// Stable exit codes: 3 configuration, 4 hardware, 5 persistence, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(BuildError::InvalidConfig(_)) = find::<BuildError>(err) {
        return 3;
    }
    match find::<SpineError>(err) {
        Some(SpineError::Config(_)) => 3,
        Some(SpineError::SensorTimeout | SpineError::Hardware(_) | SpineError::HardwareFault(_)) => 4,
        Some(SpineError::Persistence(_) | SpineError::State(_)) => 5,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = find::<BuildError>(err) {
        return match be {
            BuildError::InvalidConfig(_) => "InvalidConfig",
            _ => "Build",
        };
    }
    match find::<SpineError>(err) {
        Some(SpineError::SensorTimeout) => "SensorTimeout",
        Some(SpineError::Hardware(_) | SpineError::HardwareFault(_)) => "Hardware",
        Some(SpineError::Config(_)) => "Config",
        Some(SpineError::Persistence(_)) => "Persistence",
        Some(SpineError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
