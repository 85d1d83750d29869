//! Commit history index
//!
//! The remote `commit_history.json` maps a repository URL to every commit
//! whose artifacts have been uploaded:
//!
//! ```json
//! { "git@github.com:JetBrains/kotlin.git": ["3f2a...", "9bc1..."] }
//! ```
//!
//! Updates read the whole blob, union in the new commit and overwrite it.
//! There is no compare-and-swap: two concurrent writers race and the last
//! one wins. A coordinated backend can be substituted behind [`HistoryIndex`].

use crate::error::{SyncError, SyncResult};
use crate::store::BlobStore;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Well-known address of the index blob
pub const COMMIT_HISTORY_ADDRESS: &str = "commit_history.json";

/// Repository URL -> ordered set of cached commit identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommitHistory {
    entries: IndexMap<String, IndexSet<String>>,
}

impl CommitHistory {
    /// Parse the index. `null` entries and `null` commits are ignored.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let raw: IndexMap<String, Option<Vec<Option<String>>>> =
            serde_json::from_str(json).map_err(|e| SyncError::HistoryInvalid(e.to_string()))?;

        let entries = raw
            .into_iter()
            .map(|(repository, commits)| {
                let commits = commits.unwrap_or_default().into_iter().flatten().collect();
                (repository, commits)
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Union `commit` into the repository's set. Returns true if it was new.
    pub fn merge(&mut self, repository: &str, commit: &str) -> bool {
        self.entries
            .entry(repository.to_string())
            .or_default()
            .insert(commit.to_string())
    }

    pub fn contains(&self, repository: &str, commit: &str) -> bool {
        self.entries
            .get(repository)
            .is_some_and(|commits| commits.contains(commit))
    }

    /// Commits recorded for a repository, oldest first
    pub fn commits(&self, repository: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(repository)
            .into_iter()
            .flat_map(|commits| commits.iter().map(String::as_str))
    }

    pub fn repositories(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Persistent home of the commit history
pub trait HistoryIndex: Send + Sync {
    /// Current index; empty if none has been written yet
    fn load(&self) -> SyncResult<CommitHistory>;

    /// Add a commit and persist
    fn record(&self, repository: &str, commit: &str) -> SyncResult<Recorded>;
}

/// Index as written by [`HistoryIndex::record`]
#[derive(Debug)]
pub struct Recorded {
    pub history: CommitHistory,
    /// False if the commit was already listed
    pub added: bool,
}

/// History stored as a single blob in the artifact store
pub struct BlobHistoryIndex {
    store: Arc<dyn BlobStore>,
    address: String,
    scratch_dir: PathBuf,
}

impl BlobHistoryIndex {
    pub fn new(store: Arc<dyn BlobStore>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            address: COMMIT_HISTORY_ADDRESS.to_string(),
            scratch_dir: scratch_dir.into(),
        }
    }

    fn write(&self, history: &CommitHistory) -> SyncResult<()> {
        let json = history.to_json()?;

        let mut file = tempfile::Builder::new()
            .prefix("commit_history-")
            .suffix(".json")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| {
                SyncError::io(format!("creating temp file in {}", self.scratch_dir.display()), e)
            })?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| SyncError::io("writing commit history", e))?;

        self.store.upload(&self.address, file.path())
    }
}

impl HistoryIndex for BlobHistoryIndex {
    fn load(&self) -> SyncResult<CommitHistory> {
        if !self.store.exists(&self.address)? {
            debug!("No '{}' on server yet, starting empty", self.address);
            return Ok(CommitHistory::default());
        }

        let json = self.store.fetch_text(&self.address)?;
        CommitHistory::from_json(&json)
    }

    fn record(&self, repository: &str, commit: &str) -> SyncResult<Recorded> {
        let mut history = self.load()?;
        let added = history.merge(repository, commit);
        if added {
            info!("Adding commit {} to '{}'", commit, self.address);
        } else {
            info!("Commit {} already in '{}'", commit, self.address);
        }

        self.write(&history)?;
        Ok(Recorded { history, added })
    }
}
