//! Clap derive structures for the `heatlink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// heatlink -- run NIBE Uplink heat pump integrations from the command line
#[derive(Debug, Parser)]
#[command(
    name = "heatlink",
    version,
    about = "Poll NIBE Uplink heat pump systems and surface their notices",
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
    #[arg(long, env = "HEATLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
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
    /// Set up every configured access point and follow its systems
    Run(RunArgs),

    /// Authorize an access point with the Uplink service
    #[command(alias = "auth")]
    Authorize(AuthorizeArgs),

    /// Write one parameter of a system
    #[command(alias = "set")]
    SetParameter(SetParameterArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Only set up these access points (default: all)
    pub entries: Vec<String>,

    /// Also print every parameter on each status poll
    #[arg(long)]
    pub parameters: bool,
}

// ── Authorize ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AuthorizeArgs {
    /// Access point to authorize
    pub entry: String,

    /// Authorization code (prompted for when omitted)
    #[arg(long)]
    pub code: Option<String>,
}

// ── Set parameter ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetParameterArgs {
    /// Access point owning the system
    pub entry: String,

    /// System id
    pub system: u32,

    /// Parameter id
    pub parameter: u32,

    /// New value, as accepted by the Uplink service
    pub value: String,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
