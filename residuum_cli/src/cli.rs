//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config used when `--config` is not given and this file exists.
pub const DEFAULT_CONFIG: &str = "etc/residuum.toml";

#[derive(Parser, Debug)]
#[command(
    name = "residuum",
    version,
    about = "Thermal water-flow estimation between totalizer ticks"
)]
pub struct Cli {
    /// Path to config TOML (defaults to etc/residuum.toml when present,
    /// built-in defaults otherwise)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// State file holding auto-calibrated coefficients (read at start, rewritten on change)
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Output JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Options shared by the commands that run the estimator.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunOpts {
    /// Continue from a previously accumulated volume (litres) instead of anchoring on the totalizer
    #[arg(long, value_name = "LITRES")]
    pub restore_volume: Option<f64>,

    /// Print a snapshot after every handled reading (text mode)
    #[arg(long, action = ArgAction::SetTrue)]
    pub trace: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded `timestamp,channel,value` CSV through the estimator
    Replay {
        /// Recorded readings (strict header)
        #[arg(value_name = "CSV")]
        input: PathBuf,
        #[command(flatten)]
        run: RunOpts,
    },
    /// Read live `<channel> <value>` lines from stdin, stamped on arrival
    Follow {
        /// Readings buffered between the reader thread and the estimator
        #[arg(long, value_name = "N", default_value_t = 64)]
        buffer: usize,
        #[command(flatten)]
        run: RunOpts,
    },
    /// Run the estimator against a synthetic pipe with scheduled draws
    Simulate {
        /// Simulated duration in hours
        #[arg(long, value_name = "H", default_value_t = 24.0)]
        hours: f64,
        /// Seconds between simulated readings
        #[arg(long, value_name = "S", default_value_t = 60)]
        step_s: i64,
        /// Hours between draws
        #[arg(long, value_name = "H", default_value_t = 3.0)]
        draw_every_h: f64,
        /// Minutes each draw lasts
        #[arg(long, value_name = "MIN", default_value_t = 10.0)]
        draw_min: f64,
        /// Draw flow rate in L/min
        #[arg(long, value_name = "L", default_value_t = 6.0)]
        flow: f64,
        /// Noise seed
        #[arg(long, default_value_t = 0xC0FFEE)]
        seed: u32,
        #[command(flatten)]
        run: RunOpts,
    },
    /// Load and validate the config, then print the effective values
    CheckConfig,
    /// Compare two accelerometer recordings (water off vs. water on)
    VibCompare {
        /// Recording taken with no water flowing
        #[arg(value_name = "OFF")]
        off: PathBuf,
        /// Recording taken while water was flowing
        #[arg(value_name = "ON")]
        on: PathBuf,
    },
}
