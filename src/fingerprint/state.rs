//! Source-state snapshot recorded by the build
//!
//! Structurally `category -> build target -> {hash, relativePath}`.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Recorded hash and path template of one build target in one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTargetFingerprint {
    pub hash: String,
    #[serde(rename = "relativePath")]
    pub relative_path: String,
}

impl BuildTargetFingerprint {
    pub fn new(hash: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// Fingerprints of every build target in one category
pub type CategoryState = BTreeMap<String, BuildTargetFingerprint>;

/// Complete fingerprint snapshot for one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceState {
    categories: BTreeMap<String, CategoryState>,
}

impl SourceState {
    /// Parse the JSON snapshot
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read and parse a snapshot file
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.is_file() {
            return Err(SyncError::ArtifactMissing(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::io(format!("reading {}", path.display()), e))?;

        Self::from_json(&content).map_err(|e| SyncError::SourceStateInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Fingerprints recorded for a category
    pub fn category(&self, name: &str) -> Option<&CategoryState> {
        self.categories.get(name)
    }

    /// Add an (initially empty) category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.entry(category.into()).or_default();
        self
    }

    /// Record one build target fingerprint
    pub fn insert(
        &mut self,
        category: impl Into<String>,
        target: impl Into<String>,
        fingerprint: BuildTargetFingerprint,
    ) {
        self.categories
            .entry(category.into())
            .or_default()
            .insert(target.into(), fingerprint);
    }
}
