//! CLI argument definitions.
//!
//! All Clap derive structs for `fleetctl` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::codec::CodecMode;
use crate::observability::LogFormat;
use crate::phase::FailurePolicy;

// ============================================================================
// Root CLI
// ============================================================================

/// Ground-side mission controller for a UAV fleet.
#[derive(Parser, Debug)]
#[command(name = "fleetctl", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "FLEETCTL_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "FLEETCTL_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one mission: accept the fleet and drive it through every phase.
    Run(RunArgs),

    /// Run one simulated UAV agent against a controller.
    Agent(AgentArgs),

    /// Parse a targets file and print what would be loaded.
    Targets(TargetsArgs),
}

// ============================================================================
// Run Command
// ============================================================================

/// Arguments for `run`.
///
/// Options that can also come from the settings file are left unset here
/// when not given, so the file value can fill them in.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of participants to accept before the mission starts.
    #[arg(
        short = 'n',
        long,
        env = "FLEETCTL_FLEET_SIZE",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub fleet_size: Option<u32>,

    /// Listen address for participant connections [default: 0.0.0.0:5000].
    #[arg(short, long, env = "FLEETCTL_BIND")]
    pub bind: Option<String>,

    /// Wire codec [default: binary].
    #[arg(long, env = "FLEETCTL_CODEC")]
    pub codec: Option<CodecMode>,

    /// Targets file (bracketed `targets:` list or legacy `x,y,z` lines).
    #[arg(short, long, env = "FLEETCTL_TARGETS")]
    pub targets: Option<PathBuf>,

    /// Mission settings file (YAML).
    #[arg(short, long, env = "FLEETCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run the return-to-launch and landing phases after READY.
    #[arg(long)]
    pub return_home: bool,

    /// Wait for Enter on stdin before telling the fleet the mission is done.
    #[arg(long)]
    pub confirm: bool,

    /// Per-phase deadline (e.g. `30s`, `2m`); phases wait forever if unset.
    #[arg(long, value_parser = humantime::parse_duration, env = "FLEETCTL_PHASE_TIMEOUT")]
    pub phase_timeout: Option<Duration>,

    /// What a disconnect or failed write does to the phase [default: abort].
    #[arg(long)]
    pub on_participant_failure: Option<FailurePolicy>,

    /// Write structured JSONL events to this file (`-` for stderr).
    #[arg(long, env = "FLEETCTL_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "FLEETCTL_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Exit non-zero when the mission aborts.
    #[arg(long)]
    pub fail_on_abort: bool,
}

// ============================================================================
// Agent Command
// ============================================================================

/// Arguments for `agent`.
#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Controller address.
    #[arg(long, default_value = crate::agent::DEFAULT_CONNECT, env = "FLEETCTL_CONNECT")]
    pub connect: String,

    /// Wire codec; must match the controller's.
    #[arg(long, default_value = "binary", env = "FLEETCTL_CODEC")]
    pub codec: CodecMode,

    /// Simulated travel time for each leg.
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub travel_time: Duration,

    /// Connection attempts before giving up.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub connect_attempts: u32,

    /// Delay between connection attempts.
    #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub retry_delay: Duration,
}

// ============================================================================
// Targets Command
// ============================================================================

/// Arguments for `targets`.
#[derive(Args, Debug)]
pub struct TargetsArgs {
    /// Targets file to parse.
    pub path: PathBuf,

    /// Keep at most this many entries, as `run` would for a fleet this size.
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub fleet_size: Option<u32>,

    /// Print the parsed table as JSON.
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}
