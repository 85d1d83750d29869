//! Configuration schema for cachesync
//!
//! Configuration is stored at `~/.config/cachesync/config.toml`

use crate::fingerprint::CategoryGroup;
use crate::upload::BundleKind;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Remote blob store settings
    pub remote: RemoteConfig,

    /// Upload run settings
    pub upload: UploadConfig,

    /// Where build artifacts live inside a project
    pub layout: LayoutConfig,

    /// Fingerprint grouping
    pub fingerprint: FingerprintConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Remote blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the blob store (http or https)
    pub server_url: Option<String>,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Total connection cap
    pub max_connections: usize,

    /// Connection cap per route
    pub max_connections_per_route: usize,

    /// Redirects followed before giving up
    pub max_redirects: u32,

    /// Overall timeout per request, in seconds
    pub timeout_secs: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            user_agent: concat!("cachesync/", env!("CARGO_PKG_VERSION")).to_string(),
            max_connections: 20,
            max_connections_per_route: 10,
            max_redirects: 10,
            timeout_secs: None,
        }
    }
}

/// Whether the commit history is updated after a run with failed jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryPolicy {
    /// Record the commit only when every job succeeded or was skipped
    OnSuccess,
    /// Record the commit regardless of failures
    Always,
}

/// Upload run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Worker threads (0 = number of CPUs)
    pub workers: usize,

    /// Jobs that may wait in the queue before submit blocks
    pub queue_capacity: usize,

    /// Outstanding job count above which drain polls instead of blocking
    pub drain_threshold: usize,

    /// Drain polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Grace period for worker shutdown in seconds
    pub shutdown_timeout_secs: u64,

    /// Bundles uploaded by default
    pub bundles: Vec<BundleKind>,

    /// Commit history update policy
    pub history_policy: HistoryPolicy,

    /// Repository key used in the commit history
    pub repository_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 2048,
            drain_threshold: 100,
            poll_interval_ms: 1000,
            shutdown_timeout_secs: 10,
            bundles: BundleKind::all().to_vec(),
            history_policy: HistoryPolicy::OnSuccess,
            repository_url: "git@github.com:JetBrains/kotlin.git".to_string(),
        }
    }
}

/// Project layout, paths relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Single-line file holding the commit identifier
    pub commit_file: String,

    /// Incremental compiler cache directory
    pub caches_dir: String,

    /// Source state file, relative to the caches directory
    pub sources_state_file: String,

    /// Compiled output root (substituted for the build-dir token)
    pub out_dir: String,

    /// Distribution directory
    pub dist_dir: String,

    /// Auxiliary build tooling output
    pub build_src_dir: String,

    /// Where temporary archives are written (system temp dir if unset)
    pub scratch_dir: Option<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            commit_file: "git.branch".to_string(),
            caches_dir: "build/jps-caches".to_string(),
            sources_state_file: "target_sources_state.json".to_string(),
            out_dir: "out".to_string(),
            dist_dir: "dist".to_string(),
            build_src_dir: "buildSrc/build/classes/java".to_string(),
            scratch_dir: None,
        }
    }
}

/// Fingerprint grouping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Placeholder for the compiled output root inside recorded paths
    pub build_dir_token: String,

    /// Category groups collapsed into one address per build target
    pub groups: Vec<CategoryGroup>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            build_dir_token: crate::fingerprint::BUILD_DIR_TOKEN.to_string(),
            groups: CategoryGroup::defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.remote.max_connections, 20);
        assert_eq!(config.remote.max_connections_per_route, 10);
        assert_eq!(config.upload.drain_threshold, 100);
        assert_eq!(config.upload.history_policy, HistoryPolicy::OnSuccess);
        assert_eq!(config.fingerprint.groups.len(), 2);
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r#"
            [remote]
            server_url = "https://cache.example.com/jps/"

            [upload]
            bundles = ["caches", "parts"]
            history_policy = "always"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.remote.server_url.as_deref(),
            Some("https://cache.example.com/jps/")
        );
        assert_eq!(config.upload.bundles, vec![BundleKind::Caches, BundleKind::Parts]);
        assert_eq!(config.upload.history_policy, HistoryPolicy::Always);
        assert_eq!(config.layout.commit_file, "git.branch");
    }

    #[test]
    fn parse_custom_groups() {
        let toml_str = r#"
            [fingerprint]
            build_dir_token = "@OUT@"

            [[fingerprint.groups]]
            prefix = "main"
            categories = ["classes", "resources"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.fingerprint.build_dir_token, "@OUT@");
        assert_eq!(config.fingerprint.groups[0].prefix, "main");
        assert_eq!(config.fingerprint.groups[0].categories.len(), 2);
    }

    #[test]
    fn serialize_roundtrip() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[remote]"));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.upload.bundles, config.upload.bundles);
    }
}
