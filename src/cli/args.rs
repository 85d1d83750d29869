//! CLI argument definitions using clap derive

use crate::upload::BundleKind;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// cachesync - upload build caches to a content-addressed blob store
///
/// Packs compiler caches and compiled outputs of a finished build, uploads
/// whatever the remote does not have yet, and records the commit in the
/// shared commit history.
#[derive(Parser, Debug)]
#[command(name = "cachesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CACHESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .cachesync.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Log line format (overrides general.log_format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload build artifacts for the current commit
    Upload(UploadArgs),

    /// Show the compilation outputs computed from the source state
    Outputs(OutputsArgs),

    /// Show the remote commit history or check one commit
    History(HistoryArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Remote server option shared by commands that talk to the store
#[derive(clap::Args, Debug, Clone)]
pub struct ServerArgs {
    /// Blob store base URL (overrides remote.server_url)
    #[arg(long = "server", env = "CACHESYNC_SERVER_URL")]
    pub url: Option<String>,
}

/// Arguments for the upload command
#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Project directory (defaults to current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Commit identifier (defaults to the first line of the commit file)
    #[arg(long)]
    pub commit: Option<String>,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Bundles to upload (repeatable; defaults to upload.bundles)
    #[arg(short, long = "bundle", value_enum)]
    pub bundles: Vec<BundleKind>,

    /// Worker threads (defaults to upload.workers, 0 = CPU count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Probe the remote but upload nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Exit non-zero if any job failed
    #[arg(long)]
    pub strict: bool,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Arguments for the outputs command
#[derive(Parser, Debug)]
pub struct OutputsArgs {
    /// Project directory (defaults to current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Source state file (defaults to the one in the caches directory)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the history command
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Repository key (defaults to upload.repository_url)
    #[arg(long)]
    pub repo: Option<String>,

    /// Only check whether this commit is cached
    #[arg(long)]
    pub commit: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., remote.server_url)
        key: String,
        /// Value to set
        value: String,
        /// Write to project-local .cachesync.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
