//! Content addresses for compiled build-target outputs
//!
//! A build target's output directory is often shared by several categories
//! (compiled classes and processed resources land in the same tree). Targets
//! present in every category of a group collapse into one address whose hash
//! combines the per-category hashes; the remaining targets keep their own
//! category and recorded hash.
//!
//! | Group | Categories |
//! |-------|------------|
//! | production | java-production, resources-production, gradle-resources-production |
//! | test | java-test, resources-test, gradle-resources-test |

pub mod hash;
pub mod state;

pub use state::{BuildTargetFingerprint, CategoryState, SourceState};

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Placeholder for the compiled-output root in recorded paths
pub const BUILD_DIR_TOKEN: &str = "$BUILD_DIR$";

/// One addressable unit to upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationOutput {
    pub name: String,
    pub category: String,
    pub hash: String,
    pub local_path: PathBuf,
}

impl CompilationOutput {
    /// Remote address: `<category>/<name>/<hash>`
    pub fn address(&self) -> String {
        format!("{}/{}/{}", self.category, self.name, self.hash)
    }
}

/// Categories that describe the same logical artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    /// Category tag given to build targets shared by all categories
    pub prefix: String,
    /// Category names, in hash-combination order
    pub categories: Vec<String>,
}

impl CategoryGroup {
    pub fn new(prefix: impl Into<String>, categories: &[&str]) -> Self {
        Self {
            prefix: prefix.into(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn production() -> Self {
        Self::new(
            "production",
            &["java-production", "resources-production", "gradle-resources-production"],
        )
    }

    pub fn test() -> Self {
        Self::new("test", &["java-test", "resources-test", "gradle-resources-test"])
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::production(), Self::test()]
    }
}

/// Turns a source state into the minimal set of compilation outputs
#[derive(Debug, Clone)]
pub struct FingerprintProcessor {
    groups: Vec<CategoryGroup>,
    build_root: PathBuf,
    token: String,
}

impl FingerprintProcessor {
    /// Processor with the default groups and token
    ///
    /// `build_root` replaces the token in recorded paths and should be absolute.
    pub fn new(build_root: impl Into<PathBuf>) -> Self {
        Self {
            groups: CategoryGroup::defaults(),
            build_root: build_root.into(),
            token: BUILD_DIR_TOKEN.to_string(),
        }
    }

    pub fn with_groups(mut self, groups: Vec<CategoryGroup>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Outputs for every group, concatenated in group order
    pub fn compilation_outputs(&self, state: &SourceState) -> SyncResult<Vec<CompilationOutput>> {
        let mut outputs = Vec::new();
        for group in &self.groups {
            outputs.extend(self.group_outputs(group, state)?);
        }
        Ok(outputs)
    }

    /// Outputs for a single group: shared targets first, then per-category remainders
    pub fn group_outputs(
        &self,
        group: &CategoryGroup,
        state: &SourceState,
    ) -> SyncResult<Vec<CompilationOutput>> {
        let maps = group
            .categories
            .iter()
            .map(|category| {
                state
                    .category(category)
                    .map(|map| (category.as_str(), map))
                    .ok_or_else(|| SyncError::CategoryMissing {
                        group: group.prefix.clone(),
                        category: category.clone(),
                    })
            })
            .collect::<SyncResult<Vec<_>>>()?;

        let Some(((_, first), rest)) = maps.split_first() else {
            return Err(SyncError::GroupEmpty(group.prefix.clone()));
        };

        let shared: BTreeSet<&str> = first
            .keys()
            .map(String::as_str)
            .filter(|name| rest.iter().all(|(_, map)| map.contains_key(*name)))
            .collect();

        let mut outputs = Vec::new();

        for name in &shared {
            let hash = hash::combine(maps.iter().map(|(_, map)| map[*name].hash.as_str()))?;
            outputs.push(CompilationOutput {
                name: name.to_string(),
                category: group.prefix.clone(),
                hash,
                local_path: self.resolve(&first[*name].relative_path),
            });
        }

        for (category, map) in &maps {
            for (name, fingerprint) in map.iter() {
                if shared.contains(name.as_str()) {
                    continue;
                }
                outputs.push(CompilationOutput {
                    name: name.clone(),
                    category: category.to_string(),
                    hash: fingerprint.hash.clone(),
                    local_path: self.resolve(&fingerprint.relative_path),
                });
            }
        }

        debug!(
            "Group '{}': {} shared, {} category-specific outputs",
            group.prefix,
            shared.len(),
            outputs.len() - shared.len()
        );

        Ok(outputs)
    }

    fn resolve(&self, relative_path: &str) -> PathBuf {
        PathBuf::from(relative_path.replace(&self.token, &self.build_root.to_string_lossy()))
    }
}
