//! cachesync - build cache uploader
//!
//! CLI entry point that dispatches to subcommands.

use cachesync::cli::args::LogFormat;
use cachesync::cli::{Cli, Commands};
use cachesync::config::ConfigManager;
use cachesync::error::{SyncError, SyncResult};
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SyncResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions(args) = cli.command {
        return cachesync::cli::commands::completions(args).await;
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir().map_err(|e| SyncError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    let log_format = cli.log_format.unwrap_or(if config.general.log_format == "json" {
        LogFormat::Json
    } else {
        LogFormat::Text
    });
    init_logging(cli.verbose, log_format);

    debug!("Config file: {}", config_manager.path().display());
    match (&local_config_path, cli.no_local) {
        (_, true) => debug!("Local config discovery disabled (--no-local)"),
        (Some(path), _) => debug!("Found local config: {}", path.display()),
        (None, _) => {}
    }

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Upload(args) => cachesync::cli::commands::upload(args, &config).await,
        Commands::Outputs(args) => cachesync::cli::commands::outputs(args, &config).await,
        Commands::History(args) => cachesync::cli::commands::history(args, &config).await,
        Commands::Config(args) => {
            cachesync::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug. Logs go to stderr.
fn init_logging(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => EnvFilter::new("cachesync=warn"),
        1 => EnvFilter::new("cachesync=info"),
        _ => EnvFilter::new("cachesync=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.without_time().init(),
        LogFormat::Json => builder.json().with_current_span(false).init(),
    }
}
