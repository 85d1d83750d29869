//! Artifact bundle kinds

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefixes of the addresses keyed by commit identifier
pub const CACHES_PREFIX: &str = "caches";
pub const METADATA_PREFIX: &str = "metadata";
pub const OUT_PREFIX: &str = "out";
pub const DIST_PREFIX: &str = "dist";
pub const BUILD_SRC_PREFIX: &str = "buildSrc";

/// Independently uploaded groups of artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BundleKind {
    /// Incremental compiler caches plus the source-state metadata file
    Caches,
    /// One content-addressed archive per compiled build target
    Parts,
    /// The whole compiled-output tree
    Out,
    /// The distribution directory
    Dist,
    /// Auxiliary build tooling output
    BuildSrc,
}

impl BundleKind {
    pub fn all() -> &'static [Self] {
        &[Self::Caches, Self::Parts, Self::Out, Self::Dist, Self::BuildSrc]
    }

}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Caches => "caches",
            Self::Parts => "parts",
            Self::Out => "out",
            Self::Dist => "dist",
            Self::BuildSrc => "build-src",
        };
        write!(f, "{}", name)
    }
}

/// Address of a commit-keyed artifact, e.g. `dist/<commit>`
pub fn commit_address(prefix: &str, commit: &str) -> String {
    format!("{}/{}", prefix, commit)
}
