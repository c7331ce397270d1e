//! Clap derive structures for the `restmodel` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// restmodel -- run declarative REST model actions from the shell
#[derive(Debug, Parser)]
#[command(
    name = "restmodel",
    version,
    about = "Run declarative REST model actions from the command line",
    long_about = "Loads model types from a TOML config file, builds a model from a JSON\n\
        record and runs one of its actions through the configured HTTP endpoint.",
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
    #[arg(long, env = "RESTMODEL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL (overrides `defaults.base_url`)
    #[arg(long, short = 'u', env = "RESTMODEL_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "json", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an action against the server
    Act(ActArgs),

    /// Show the request an action would send, without sending it
    Preview(PreviewArgs),

    /// List configured model types and their actions
    Models,

    /// Inspect CLI configuration
    Config(ConfigArgs),
}

// ── Shared Payload Arguments ─────────────────────────────────────────

/// Model selection plus pipeline steps staged before the action.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Registered model type
    pub model: String,

    /// Action name
    pub action: String,

    /// JSON record file, or `-` for stdin
    #[arg(long, short = 'r')]
    pub record: Option<PathBuf>,

    /// Send only these keys
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Drop these keys
    #[arg(long, value_delimiter = ',')]
    pub without: Vec<String>,

    /// JSON object merged under the payload
    #[arg(long, value_name = "JSON")]
    pub with: Option<String>,
}

#[derive(Debug, Args)]
pub struct ActArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// HTTP method override
    #[arg(long, short = 'X')]
    pub method: Option<String>,

    /// Route override (appended to the base route)
    #[arg(long)]
    pub route: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the resolved configuration (secrets masked)
    Show,
}
