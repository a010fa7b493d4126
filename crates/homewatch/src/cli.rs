//! Clap derive structures for the `homewatch` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this file may
//! only depend on clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homewatch -- sensor monitor and porch bulb controller
#[derive(Debug, Parser)]
#[command(
    name = "homewatch",
    version,
    about = "Monitor home sensors, drive the porch bulb, and keep a public tunnel up",
    long_about = "Reads the light and temperature helpers on a fixed interval, switches the \
        bulb relay with a time-of-day and light-level hysteresis, persists the \
        settings, and keeps a public tunnel to the device alive.\n\n\
        `homewatch run` is the daemon. The other commands are one-shot diagnostics.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "HOMEWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the monitor daemon
    Run(RunArgs),

    /// Read one sensor source
    Read(ReadArgs),

    /// Collect every source and the health report once
    #[command(alias = "snap")]
    Snapshot,

    /// Evaluate the bulb policy for the given inputs
    Decide(DecideArgs),

    /// Open the tunnel once and report the granted URL
    TunnelCheck,

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Accept JSON commands on stdin, one per line
    #[arg(long)]
    pub stdin_commands: bool,

    /// Print every monitor event to stdout as a JSON line
    #[arg(long)]
    pub print_events: bool,

    /// Do not start the tunnel, even if enabled in the config
    #[arg(long)]
    pub no_tunnel: bool,
}

// ── Read ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Source name as configured under [monitor.sources]
    pub source: String,
}

// ── Decide ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Sensor,
    Manual,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BulbArg {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct DecideArgs {
    /// Control mode
    #[arg(long, default_value = "sensor")]
    pub mode: ModeArg,

    /// Bulb state before the decision
    #[arg(long)]
    pub previous: BulbArg,

    /// Local hour of day
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=23))]
    pub hour: u32,

    /// Light reading; omit to simulate a failed read
    #[arg(long, allow_negative_numbers = true)]
    pub light: Option<f64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
