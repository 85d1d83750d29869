//! Error types for cachesync
//!
//! All modules use `SyncResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cachesync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// All errors that can occur while synchronizing build caches
#[derive(Error, Debug)]
pub enum SyncError {
    // Configuration errors
    #[error("Commit identifier file not found: {0}")]
    CommitIdMissing(PathBuf),

    #[error("Commit identifier file is empty: {0}")]
    CommitIdEmpty(PathBuf),

    #[error("Source state has no '{category}' category (required by group '{group}')")]
    CategoryMissing { group: String, category: String },

    #[error("Fingerprint group '{0}' lists no categories")]
    GroupEmpty(String),

    #[error("Local artifact does not exist: {0}")]
    ArtifactMissing(PathBuf),

    #[error("No remote server URL configured")]
    ServerUrlMissing,

    #[error("Invalid remote server URL '{url}': {reason}")]
    ServerUrlInvalid { url: String, reason: String },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source state {path}: {reason}")]
    SourceStateInvalid { path: PathBuf, reason: String },

    #[error("Invalid commit history: {0}")]
    HistoryInvalid(String),

    // Protocol errors
    #[error("{method} {address} responded with unexpected {status}")]
    UnexpectedStatus {
        method: &'static str,
        address: String,
        status: u16,
    },

    // Transport errors
    #[error("Failed to {method} {address}")]
    Transport {
        method: &'static str,
        address: String,
        #[source]
        source: Box<ureq::Error>,
    },

    // Partial-run errors
    #[error("Upload finished with {failed} failed job(s)")]
    PartialUpload { failed: usize },

    #[error("Job panicked: {0}")]
    JobPanicked(String),

    #[error("Upload executor is shut down")]
    ExecutorShutDown,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl SyncError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap a transport failure with the attempted method and address
    pub fn transport(method: &'static str, address: impl Into<String>, source: ureq::Error) -> Self {
        Self::Transport {
            method,
            address: address.into(),
            source: Box::new(source),
        }
    }

    /// Configuration problems abort a job or a whole run; they never go away on retry.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::CommitIdMissing(_)
                | Self::CommitIdEmpty(_)
                | Self::CategoryMissing { .. }
                | Self::GroupEmpty(_)
                | Self::ArtifactMissing(_)
                | Self::ServerUrlMissing
                | Self::ServerUrlInvalid { .. }
                | Self::ConfigInvalid { .. }
                | Self::SourceStateInvalid { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ServerUrlMissing => {
                Some("Pass --server, set CACHESYNC_SERVER_URL, or run: cachesync config set remote.server_url <url>")
            }
            Self::CommitIdMissing(_) | Self::CommitIdEmpty(_) => {
                Some("Write the current commit hash to the commit file or pass --commit")
            }
            Self::CategoryMissing { .. } => {
                Some("The build did not record this category; check [fingerprint] groups")
            }
            Self::PartialUpload { .. } => Some("Re-run with -v to see the failed jobs"),
            _ => None,
        }
    }
}
