//! Project layout: where a build leaves the artifacts we upload
//!
//! The build itself (importing the project, running the compiler) happens
//! elsewhere. From it we only need artifact directories, the source-state
//! snapshot and the commit identifier file.

use crate::config::schema::LayoutConfig;
use crate::error::{SyncError, SyncResult};
use crate::fingerprint::SourceState;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Absolute paths of every input consumed by an upload run
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub commit_file: PathBuf,
    pub caches_dir: PathBuf,
    pub sources_state_file: PathBuf,
    pub out_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub build_src_dir: PathBuf,
    pub scratch_dir: PathBuf,
    commit_override: Option<String>,
}

impl ProjectLayout {
    /// Resolve `layout` against a project root
    pub fn new(root: &Path, layout: &LayoutConfig) -> SyncResult<Self> {
        let root = std::path::absolute(root)
            .map_err(|e| SyncError::io(format!("resolving {}", root.display()), e))?;
        let caches_dir = root.join(&layout.caches_dir);

        let scratch_dir = match &layout.scratch_dir {
            Some(dir) => root.join(dir),
            None => std::env::temp_dir(),
        };

        Ok(Self {
            commit_file: root.join(&layout.commit_file),
            sources_state_file: caches_dir.join(&layout.sources_state_file),
            out_dir: root.join(&layout.out_dir),
            dist_dir: root.join(&layout.dist_dir),
            build_src_dir: root.join(&layout.build_src_dir),
            caches_dir,
            scratch_dir,
            root,
            commit_override: None,
        })
    }

    /// Use `commit` instead of reading the commit file
    pub fn with_commit(mut self, commit: Option<String>) -> Self {
        self.commit_override = commit.filter(|c| !c.trim().is_empty());
        self
    }

    /// The commit identifier addressing this upload batch, trimmed
    pub fn commit_id(&self) -> SyncResult<String> {
        if let Some(commit) = &self.commit_override {
            return Ok(commit.trim().to_string());
        }

        if !self.commit_file.is_file() {
            return Err(SyncError::CommitIdMissing(self.commit_file.clone()));
        }

        let content = fs::read_to_string(&self.commit_file)
            .map_err(|e| SyncError::io(format!("reading {}", self.commit_file.display()), e))?;
        let commit = content.lines().next().unwrap_or("").trim();
        if commit.is_empty() {
            return Err(SyncError::CommitIdEmpty(self.commit_file.clone()));
        }

        debug!("Commit {} from {}", commit, self.commit_file.display());
        Ok(commit.to_string())
    }

    /// Parse the source-state snapshot
    pub fn source_state(&self) -> SyncResult<SourceState> {
        SourceState::load(&self.sources_state_file)
    }
}
