//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "polar", version, about = "Polar cup sensing and cooling controller")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/polar_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop until Ctrl-C (or for a fixed number of cycles)
    Run {
        /// Stop after this many cycles (skipped cycles included)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Override control.period_ms
        #[arg(long, value_name = "MS")]
        period_ms: Option<u64>,
        /// Tare at start without waiting for Enter (the scale must already be empty)
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Derive and persist the load-cell scale factor from a reference mass
    Calibrate {
        /// Reference mass in grams (defaults to calibration.reference_mass)
        #[arg(long, value_name = "GRAMS", allow_negative_numbers = true)]
        mass: Option<f32>,
        /// Do not wait for Enter before taring and after placing the mass
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Read every sensor once and exercise the cooler
    SelfCheck,
}
