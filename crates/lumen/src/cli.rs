//! Clap derive structures for the `lumen` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lumen -- bridge LAN lighting controllers into a home-automation registry
#[derive(Debug, Parser)]
#[command(
    name = "lumen",
    version,
    about = "Discover LAN lighting controllers and keep a bridge registry in sync",
    long_about = "Discovers MagicHome-compatible lighting controllers on the local network,\n\
        reconciles them against a persisted accessory cache, and registers, updates,\n\
        or prunes accessories on a host bridge registry.",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "LUMEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LUMEN_OUTPUT",
        default_value = "table",
        global = true
    )]
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

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Output, Color & Log Enums ────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe the network once and list responding controllers
    Scan(ScanArgs),

    /// Run one reconciliation pass against the accessory cache
    #[command(alias = "rec")]
    Reconcile(ReconcileArgs),

    /// Run the bridge: initial pass, periodic rescans, persist on Ctrl-C
    Run(RunArgs),

    /// Inspect and edit cached accessory records
    #[command(alias = "acc", alias = "a")]
    Accessories(AccessoriesArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Scan ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// How long to collect probe replies, in milliseconds (overrides config)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

// ── Reconcile ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Print the plan without contacting the bridge or saving the cache
    #[arg(long)]
    pub dry_run: bool,
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Log bridge actions instead of delivering them
    #[arg(long)]
    pub dry_run: bool,

    /// Seconds between rescans, 0 disables (overrides config)
    #[arg(long)]
    pub interval_secs: Option<u64>,
}

// ── Accessories ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AccessoriesArgs {
    #[command(subcommand)]
    pub command: AccessoriesCommand,
}

#[derive(Debug, Subcommand)]
pub enum AccessoriesCommand {
    /// List cached accessory records
    #[command(alias = "ls")]
    List,

    /// Rename a cached record (a name containing "delete" marks it for pruning)
    Rename {
        /// Record id (UUID) or controller unique id
        id: String,

        /// New display name
        name: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets masked)
    Show,

    /// Print the configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
