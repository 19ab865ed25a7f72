//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use spine_core::Methodology;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "spine", version, about = "Arrow spine tester")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// State file to use instead of `persistence.state_file`
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Print results and errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Methodology names accepted on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MethodArg {
    /// Grams of force
    Force,
    /// Spine at 28 inch spacing
    Spine28,
    /// Spine at 26 inch spacing
    Spine26,
    /// Bow poundage at 26 inch spacing
    Pounds26,
}

impl From<MethodArg> for Methodology {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Force => Methodology::ForceUnits,
            MethodArg::Spine28 => Methodology::StandardSpineAt28,
            MethodArg::Spine26 => Methodology::AlternateSpineAt26,
            MethodArg::Pounds26 => Methodology::AlternatePoundageAt26,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the instrument loop
    #[command(
        long_about = "Run the instrument loop.\n\nIn simulation, stdin lines drive the device:\n  ok        confirm\n  a / A     function A short / long\n  b / B     function B short / long\n  load X Y  set the masses on supports A and B (grams)\n  sleep MS  pause reading stdin\n  quit      stop the loop"
    )]
    Run {
        /// Stop after this many loop ticks
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
        /// Simulated mass on support A after startup (grams)
        #[arg(long, value_name = "GRAMS", default_value_t = 0.0)]
        load_a: f32,
        /// Simulated mass on support B after startup (grams)
        #[arg(long, value_name = "GRAMS", default_value_t = 0.0)]
        load_b: f32,
        /// Raw units per gram of the simulated cells
        #[arg(long, value_name = "RAW", default_value_t = 1.0)]
        sensitivity: f32,
        /// Simulate the short (23 inch) support spacing
        #[arg(long, action = ArgAction::SetTrue)]
        short_spacing: bool,
    },
    /// Convert a deflection force to the chosen methodology
    Convert {
        /// Total force on both supports (grams)
        #[arg(long, value_name = "GRAMS", allow_hyphen_values = true)]
        force: f32,
        #[arg(long, value_enum, default_value_t = MethodArg::Spine28)]
        method: MethodArg,
        #[arg(long, action = ArgAction::SetTrue)]
        short_spacing: bool,
    },
    /// Balance point and front of center from the two support readings
    Cog {
        /// Mass on support A (grams)
        #[arg(long, value_name = "GRAMS")]
        a: f32,
        /// Mass on support B (grams)
        #[arg(long, value_name = "GRAMS")]
        b: f32,
        /// Arrow length in 1/16 inch
        #[arg(long, value_name = "SIXTEENTHS", default_value_t = 464)]
        length: u16,
        #[arg(long, action = ArgAction::SetTrue)]
        short_spacing: bool,
    },
    /// Average of six rotational peak readings, latest first
    Average {
        #[arg(long, value_name = "G,G,G,G,G,G", value_delimiter = ',', required = true)]
        peaks: Vec<f32>,
    },
    /// Inspect or edit the persisted device state
    State {
        #[command(subcommand)]
        cmd: StateCmd,
    },
    /// Validate config and state, read both load cells
    SelfCheck,
}

#[derive(Subcommand, Debug)]
pub enum StateCmd {
    /// Print the stored state (defaults when none was saved)
    Show,
    /// Set the arrow length in 1/16 inch
    SetLength {
        #[arg(value_name = "SIXTEENTHS")]
        sixteenths: u16,
    },
    /// Set the methodology
    SetMethod {
        #[arg(value_enum)]
        method: MethodArg,
    },
}
