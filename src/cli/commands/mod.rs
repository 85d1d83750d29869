//! CLI command implementations

pub mod completions;
pub mod config;
pub mod history;
pub mod outputs;
pub mod upload;

pub use completions::execute as completions;
pub use config::execute as config;
pub use history::execute as history;
pub use outputs::execute as outputs;
pub use upload::execute as upload;

use crate::cli::args::ServerArgs;
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::store::HttpBlobStore;
use std::path::PathBuf;

/// Client for `--server`, falling back to `remote.server_url`
fn open_store(server: &ServerArgs, config: &Config) -> SyncResult<HttpBlobStore> {
    let url = server
        .url
        .as_deref()
        .or(config.remote.server_url.as_deref())
        .filter(|url| !url.trim().is_empty())
        .ok_or(SyncError::ServerUrlMissing)?;

    HttpBlobStore::new(url, &config.remote)
}

/// `--project`, or the current directory
fn project_root(project: Option<PathBuf>) -> SyncResult<PathBuf> {
    match project {
        Some(path) => Ok(path),
        None => std::env::current_dir().map_err(|e| SyncError::io("getting current directory", e)),
    }
}
