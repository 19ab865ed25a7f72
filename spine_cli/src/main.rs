//! `spine`: arrow spine tester front end.

mod cli;
mod commands;
mod error_fmt;
mod run;

use std::path::{Path, PathBuf};

use clap::Parser;
use spine_config::Config;
use spine_core::SpineError;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::RunOpts;

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .map_err(|e| SpineError::Config(format!("read {}: {e}", p.display())))?;
            spine_config::load_toml(&text)
                .map_err(|e| SpineError::Config(format!("parse {}: {e}", p.display())))?
        }
        None => Config::default(),
    };
    cfg.validate().map_err(|e| SpineError::Config(e.to_string()))?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout carries only the display and results.
/// `RUST_LOG` wins over `--log-level`, which wins over `[logging] level`.
fn init_tracing(json: bool, cli_level: Option<&str>, logging: &spine_config::Logging) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = cli_level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let console_text = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file_layer = logging.file.as_deref().map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = path
            .file_name()
            .map_or_else(|| "spine.log".into(), std::ffi::OsStr::to_os_string);
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_text)
        .with(file_layer)
        .try_init();
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging);

    let state_file = cli
        .state
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.persistence.state_file));
    tracing::debug!(config = ?cli.config, state = %state_file.display(), "starting");

    match cli.cmd {
        Commands::Run {
            max_ticks,
            load_a,
            load_b,
            sensitivity,
            short_spacing,
        } => {
            if !(sensitivity.is_finite() && sensitivity > 0.0) {
                eyre::bail!("--sensitivity must be > 0");
            }
            let opts = RunOpts {
                max_ticks,
                load_a,
                load_b,
                sensitivity,
                short_spacing,
            };
            #[cfg(all(feature = "hardware", target_os = "linux"))]
            let ticks = run::run_hardware(&cfg, &state_file, opts)?;
            #[cfg(not(all(feature = "hardware", target_os = "linux")))]
            let ticks = run::run_simulated(&cfg, &state_file, opts)?;
            if cli.json {
                println!("{}", serde_json::json!({ "ticks": ticks }));
            }
        }
        Commands::Convert {
            force,
            method,
            short_spacing,
        } => commands::convert(force, method, short_spacing, cli.json),
        Commands::Cog {
            a,
            b,
            length,
            short_spacing,
        } => commands::cog(a, b, length, short_spacing, cli.json),
        Commands::Average { peaks } => commands::average(&peaks, cli.json)?,
        Commands::State { cmd } => commands::state(&cmd, &state_file, cli.json)?,
        Commands::SelfCheck => commands::self_check(&cfg, &state_file, cli.json)?,
    }
    Ok(())
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        tracing::error!(error = %e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}
