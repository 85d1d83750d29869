//! Upload orchestration
//!
//! One run walks `ResolveCommitId -> SubmitJobs -> Drain -> UpdateCommitHistory`.
//! Jobs for different bundles are independent and may finish in any order;
//! the commit history is touched only after every job has resolved, so the
//! index never claims a commit before its uploads were attempted.
//!
//! | Bundle | Remote address | Local source |
//! |--------|----------------|--------------|
//! | caches | `caches/<commit>`, `metadata/<commit>` | caches dir, source-state file |
//! | parts | `<category>/<target>/<hash>` | each compiled output dir |
//! | out | `out/<commit>` | compiled output root |
//! | dist | `dist/<commit>` | distribution dir |
//! | build-src | `buildSrc/<commit>` | auxiliary build tooling output |

pub mod bundle;
pub mod report;

pub use bundle::BundleKind;
use bundle::{BUILD_SRC_PREFIX, CACHES_PREFIX, DIST_PREFIX, METADATA_PREFIX, OUT_PREFIX};
pub use report::{FailureRecord, HistoryUpdate, Transfer, TransferAction, UploadReport};

use crate::archive;
use crate::config::{Config, HistoryPolicy};
use crate::error::{SyncError, SyncResult};
use crate::executor::{ExecutorOptions, JobFailure, UploadExecutor};
use crate::fingerprint::{CategoryGroup, FingerprintProcessor, BUILD_DIR_TOKEN};
use crate::history::HistoryIndex;
use crate::project::ProjectLayout;
use crate::store::BlobStore;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What to upload and how
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub bundles: Vec<BundleKind>,
    pub history_policy: HistoryPolicy,
    pub repository_url: String,
    pub executor: ExecutorOptions,
    pub groups: Vec<CategoryGroup>,
    pub build_dir_token: String,
    /// Probe only: nothing is packed or written
    pub dry_run: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            bundles: BundleKind::all().to_vec(),
            history_policy: HistoryPolicy::OnSuccess,
            repository_url: "git@github.com:JetBrains/kotlin.git".to_string(),
            executor: ExecutorOptions::default(),
            groups: CategoryGroup::defaults(),
            build_dir_token: BUILD_DIR_TOKEN.to_string(),
            dry_run: false,
        }
    }
}

impl UploadSettings {
    /// Settings as configured in `[upload]` and `[fingerprint]`
    pub fn from_config(config: &Config) -> Self {
        let upload = &config.upload;
        let executor = ExecutorOptions {
            queue_capacity: upload.queue_capacity,
            drain_threshold: upload.drain_threshold,
            poll_interval: Duration::from_millis(upload.poll_interval_ms),
            shutdown_timeout: Duration::from_secs(upload.shutdown_timeout_secs),
            ..ExecutorOptions::default()
        }
        .with_workers(upload.workers);

        Self {
            bundles: upload.bundles.clone(),
            history_policy: upload.history_policy,
            repository_url: upload.repository_url.clone(),
            executor,
            groups: config.fingerprint.groups.clone(),
            build_dir_token: config.fingerprint.build_dir_token.clone(),
            dry_run: false,
        }
    }
}

type Executor = UploadExecutor<Vec<Transfer>>;

/// Coordinates one upload of a project's build artifacts
pub struct Uploader {
    store: Arc<dyn BlobStore>,
    history: Arc<dyn HistoryIndex>,
    layout: ProjectLayout,
    settings: UploadSettings,
}

impl Uploader {
    pub fn new(
        store: Arc<dyn BlobStore>,
        history: Arc<dyn HistoryIndex>,
        layout: ProjectLayout,
        settings: UploadSettings,
    ) -> Self {
        Self {
            store,
            history,
            layout,
            settings,
        }
    }

    /// Run every configured bundle upload, then update the commit history.
    ///
    /// Fails only when no commit identifier can be resolved or the worker
    /// pool cannot start; per-job problems are collected in the report.
    pub fn upload(&self) -> SyncResult<UploadReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let commit = self.layout.commit_id()?;

        let mut executor = Executor::new(self.settings.executor.clone())?;
        info!(
            run = %run_id,
            commit = %commit,
            "{} threads will be used for upload to {}",
            executor.worker_count(),
            self.store.location()
        );

        let (transfers, failures, history) = self.run(&mut executor, &commit);
        executor.shutdown();

        Ok(UploadReport {
            run_id,
            commit,
            started_at,
            finished_at: Utc::now(),
            transfers,
            failures,
            history,
        })
    }

    fn run(
        &self,
        executor: &mut Executor,
        commit: &str,
    ) -> (Vec<Transfer>, Vec<JobFailure>, HistoryUpdate) {
        let mut failures = Vec::new();

        for kind in &self.settings.bundles {
            if let Err(error) = self.submit_bundle(executor, *kind, commit) {
                warn!("Could not schedule {} upload: {}", kind, error);
                failures.push(JobFailure {
                    label: kind.to_string(),
                    error,
                });
            }
        }

        executor.drain();

        let transfers: Vec<Transfer> = executor.take_results().into_iter().flatten().collect();
        failures.extend(executor.take_failures());

        for failure in &failures {
            error!("Upload job '{}' failed: {}", failure.label, failure.error);
        }

        let history = match self.update_history(commit, failures.len()) {
            Ok(update) => update,
            Err(error) => {
                error!("Commit history update failed: {}", error);
                failures.push(JobFailure {
                    label: "commit history".to_string(),
                    error,
                });
                HistoryUpdate::Skipped {
                    reason: "update failed".to_string(),
                }
            }
        };

        (transfers, failures, history)
    }

    fn update_history(&self, commit: &str, failed: usize) -> SyncResult<HistoryUpdate> {
        if failed > 0 && self.settings.history_policy == HistoryPolicy::OnSuccess {
            let reason = format!("{} job(s) failed", failed);
            warn!("Not recording commit {} in history: {}", commit, reason);
            return Ok(HistoryUpdate::Skipped { reason });
        }

        let repository = &self.settings.repository_url;
        if self.settings.dry_run {
            let added = !self.history.load()?.contains(repository, commit);
            info!("[dry-run] would record commit {} for {}", commit, repository);
            return Ok(HistoryUpdate::Planned { added });
        }

        let recorded = self.history.record(repository, commit)?;
        info!("Commit history updated for {}", repository);

        Ok(HistoryUpdate::Recorded {
            added: recorded.added,
        })
    }

    fn submit_bundle(&self, executor: &mut Executor, kind: BundleKind, commit: &str) -> SyncResult<()> {
        let store = Arc::clone(&self.store);
        let scratch = self.layout.scratch_dir.clone();
        let dry_run = self.settings.dry_run;
        let label = kind.to_string();

        match kind {
            BundleKind::Caches => {
                let caches = bundle::commit_address(CACHES_PREFIX, commit);
                let metadata = bundle::commit_address(METADATA_PREFIX, commit);
                let caches_dir = self.layout.caches_dir.clone();
                let state_file = self.layout.sources_state_file.clone();

                executor.submit(label, move || {
                    info!("Uploading caches...");
                    let mut transfers = Vec::with_capacity(2);
                    transfers.push(transfer(&*store, &caches, Source::Directory(&caches_dir), &scratch, dry_run)?);

                    info!("Uploading compilation metadata...");
                    transfers.push(transfer(&*store, &metadata, Source::File(&state_file), &scratch, dry_run)?);
                    Ok(transfers)
                })
            }
            BundleKind::Parts => {
                let processor = FingerprintProcessor::new(self.layout.out_dir.clone())
                    .with_groups(self.settings.groups.clone())
                    .with_token(self.settings.build_dir_token.clone());
                let outputs = processor.compilation_outputs(&self.layout.source_state()?)?;
                info!("{} compilation outputs to upload", outputs.len());

                for output in outputs {
                    let store = Arc::clone(&store);
                    let scratch = scratch.clone();
                    let address = output.address();

                    executor.submit(address.clone(), move || {
                        let step = transfer(&*store, &address, Source::Directory(&output.local_path), &scratch, dry_run)?;
                        Ok(vec![step])
                    })?;
                }
                Ok(())
            }
            BundleKind::Out | BundleKind::Dist | BundleKind::BuildSrc => {
                let (prefix, dir) = match kind {
                    BundleKind::Out => (OUT_PREFIX, self.layout.out_dir.clone()),
                    BundleKind::Dist => (DIST_PREFIX, self.layout.dist_dir.clone()),
                    _ => (BUILD_SRC_PREFIX, self.layout.build_src_dir.clone()),
                };
                let address = bundle::commit_address(prefix, commit);

                executor.submit(label, move || {
                    info!("Uploading {}...", address);
                    let step = transfer(&*store, &address, Source::Directory(&dir), &scratch, dry_run)?;
                    Ok(vec![step])
                })
            }
        }
    }
}

/// Local side of one upload step
#[derive(Clone, Copy)]
enum Source<'a> {
    /// Packed into an archive before upload
    Directory(&'a Path),
    /// Uploaded as is
    File(&'a Path),
}

impl Source<'_> {
    fn path(&self) -> &Path {
        match self {
            Source::Directory(path) | Source::File(path) => path,
        }
    }
}

/// Probe `address`, and upload `source` only if it is absent.
///
/// A dry run stops after checking that `source` exists.
fn transfer(
    store: &dyn BlobStore,
    address: &str,
    source: Source<'_>,
    scratch: &Path,
    dry_run: bool,
) -> SyncResult<Transfer> {
    if store.exists(address)? {
        info!("'{}' already exists on server, nothing to upload", address);
        return Ok(Transfer::skipped(address));
    }

    if dry_run {
        let present = match source {
            Source::Directory(dir) => dir.is_dir(),
            Source::File(path) => path.is_file(),
        };
        if !present {
            return Err(SyncError::ArtifactMissing(source.path().to_path_buf()));
        }
        info!("[dry-run] would upload {} to '{}'", source.path().display(), address);
        return Ok(Transfer::planned(address));
    }

    let bytes = match source {
        Source::Directory(dir) => {
            let packed = archive::pack_directory(dir, scratch, address)?;
            store.upload(address, packed.path())?;
            debug!("'{}' archive sha256 {}", address, packed.sha256());
            packed.size()
        }
        Source::File(path) => {
            store.upload(address, path)?;
            std::fs::metadata(path)
                .map_err(|e| SyncError::io(format!("reading metadata of {}", path.display()), e))?
                .len()
        }
    };

    info!("'{}' uploaded ({} bytes)", address, bytes);
    Ok(Transfer::uploaded(address, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LayoutConfig;
    use crate::fingerprint::hash;
    use crate::history::{BlobHistoryIndex, CommitHistory, COMMIT_HISTORY_ADDRESS};
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    const REPO: &str = "git@github.com:JetBrains/kotlin.git";

    struct Fixture {
        temp: TempDir,
        store: Arc<MemoryStore>,
    }

    impl Fixture {
        /// Project with one production target "app" hashed h1/h2/h3
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let root = temp.path();

            fs::write(root.join("git.branch"), "deadbeef\n").unwrap();

            let caches = root.join("build/jps-caches");
            fs::create_dir_all(caches.join("targets")).unwrap();
            fs::write(caches.join("targets/data.bin"), b"cache").unwrap();

            let path = "$BUILD_DIR$/production/app";
            let state = serde_json::json!({
                "java-production": {"app": {"hash": "h1", "relativePath": path}},
                "resources-production": {"app": {"hash": "h2", "relativePath": path}},
                "gradle-resources-production": {"app": {"hash": "h3", "relativePath": path}},
                "java-test": {},
                "resources-test": {},
                "gradle-resources-test": {},
            });
            fs::write(caches.join("target_sources_state.json"), state.to_string()).unwrap();

            let app = root.join("out/production/app");
            fs::create_dir_all(&app).unwrap();
            fs::write(app.join("Main.class"), b"classes").unwrap();

            fs::create_dir_all(root.join("scratch")).unwrap();

            Self {
                temp,
                store: Arc::new(MemoryStore::new()),
            }
        }

        fn layout(&self) -> ProjectLayout {
            let config = LayoutConfig {
                scratch_dir: Some("scratch".to_string()),
                ..LayoutConfig::default()
            };
            ProjectLayout::new(self.temp.path(), &config).unwrap()
        }

        /// Also create the dist and buildSrc directories
        fn with_all_dirs(self) -> Self {
            let layout = self.layout();
            fs::create_dir_all(&layout.dist_dir).unwrap();
            fs::write(layout.dist_dir.join("kotlin.zip"), b"dist").unwrap();
            fs::create_dir_all(&layout.build_src_dir).unwrap();
            fs::write(layout.build_src_dir.join("Plugin.class"), b"plugin").unwrap();
            self
        }

        fn settings(&self, bundles: &[BundleKind], policy: HistoryPolicy) -> UploadSettings {
            UploadSettings {
                bundles: bundles.to_vec(),
                history_policy: policy,
                executor: ExecutorOptions {
                    workers: 3,
                    poll_interval: Duration::from_millis(10),
                    ..ExecutorOptions::default()
                },
                ..UploadSettings::default()
            }
        }

        fn uploader_with(&self, settings: UploadSettings) -> Uploader {
            let layout = self.layout();
            let history = BlobHistoryIndex::new(self.store.clone(), layout.scratch_dir.clone());
            Uploader::new(self.store.clone(), Arc::new(history), layout, settings)
        }

        fn uploader(&self, bundles: &[BundleKind], policy: HistoryPolicy) -> Uploader {
            self.uploader_with(self.settings(bundles, policy))
        }

        fn history(&self) -> CommitHistory {
            CommitHistory::from_json(&self.store.fetch_text(COMMIT_HISTORY_ADDRESS).unwrap()).unwrap()
        }
    }

    fn sorted(mut addresses: Vec<String>) -> Vec<String> {
        addresses.sort();
        addresses
    }

    #[test]
    fn fresh_store_uploads_caches_metadata_and_parts() {
        let fixture = Fixture::new();
        let uploader = fixture.uploader(&[BundleKind::Caches, BundleKind::Parts], HistoryPolicy::OnSuccess);

        let report = uploader.upload().unwrap();

        let part = format!("production/app/{}", hash::combined_hash("h1h2h3").unwrap());
        assert_eq!(
            sorted(fixture.store.put_log()),
            sorted(vec![
                "caches/deadbeef".to_string(),
                "metadata/deadbeef".to_string(),
                part,
                COMMIT_HISTORY_ADDRESS.to_string(),
            ])
        );
        assert_eq!(fixture.store.put_log().last().unwrap(), COMMIT_HISTORY_ADDRESS);
        assert_eq!(report.uploaded().count(), 3);
        assert!(report.is_complete());
        assert_eq!(report.history, HistoryUpdate::Recorded { added: true });
        assert_eq!(
            fixture.history().commits(REPO).collect::<Vec<_>>(),
            vec!["deadbeef"]
        );
    }

    #[test]
    fn second_run_only_rewrites_history() {
        let fixture = Fixture::new().with_all_dirs();
        let uploader = fixture.uploader(BundleKind::all(), HistoryPolicy::OnSuccess);
        let first = uploader.upload().unwrap();
        assert!(first.is_complete());
        assert_eq!(first.uploaded().count(), 6);
        let first_history = fixture.store.get(COMMIT_HISTORY_ADDRESS).unwrap();
        let puts_before = fixture.store.put_count();

        let report = uploader.upload().unwrap();

        let new_puts = fixture.store.put_log()[puts_before..].to_vec();
        assert_eq!(new_puts, vec![COMMIT_HISTORY_ADDRESS.to_string()]);
        assert_eq!(report.uploaded().count(), 0);
        assert_eq!(report.skipped().count(), 6);
        assert_eq!(report.history, HistoryUpdate::Recorded { added: false });
        assert_eq!(fixture.store.get(COMMIT_HISTORY_ADDRESS).unwrap(), first_history);
    }

    #[test]
    fn missing_directories_fail_only_their_jobs() {
        let fixture = Fixture::new();
        let uploader = fixture.uploader(BundleKind::all(), HistoryPolicy::OnSuccess);

        let report = uploader.upload().unwrap();

        let mut failed: Vec<&str> = report.failures.iter().map(|f| f.label.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["build-src", "dist"]);
        assert!(report
            .failures
            .iter()
            .all(|f| matches!(f.error, SyncError::ArtifactMissing(_))));
        assert!(fixture.store.exists("out/deadbeef").unwrap());
        assert!(fixture.store.exists("caches/deadbeef").unwrap());

        assert!(matches!(report.history, HistoryUpdate::Skipped { .. }));
        assert!(!fixture.store.exists(COMMIT_HISTORY_ADDRESS).unwrap());
    }

    #[test]
    fn always_policy_records_despite_failures() {
        let fixture = Fixture::new();
        let uploader = fixture.uploader(&[BundleKind::Dist], HistoryPolicy::Always);

        let report = uploader.upload().unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.history, HistoryUpdate::Recorded { added: true });
        assert!(fixture.history().contains(REPO, "deadbeef"));
    }

    #[test]
    fn existing_entries_survive_history_update() {
        let fixture = Fixture::new();
        fixture
            .store
            .insert(COMMIT_HISTORY_ADDRESS, format!(r#"{{"{}":["c1"],"other":["x"]}}"#, REPO));
        let uploader = fixture.uploader(&[BundleKind::Caches], HistoryPolicy::OnSuccess);

        uploader.upload().unwrap();
        assert_eq!(fixture.store.fetch_count(), 1);

        let history = fixture.history();
        assert_eq!(history.commits(REPO).collect::<Vec<_>>(), vec!["c1", "deadbeef"]);
        assert!(history.contains("other", "x"));
    }

    #[test]
    fn unexpected_probe_status_fails_job() {
        let fixture = Fixture::new();
        fixture.store.force_status("caches/deadbeef", 500);
        let uploader = fixture.uploader(&[BundleKind::Caches, BundleKind::Out], HistoryPolicy::OnSuccess);

        let report = uploader.upload().unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            SyncError::UnexpectedStatus { status: 500, .. }
        ));
        assert!(fixture.store.exists("out/deadbeef").unwrap());
        assert!(!fixture.store.exists("metadata/deadbeef").unwrap());
    }

    #[test]
    fn caches_and_metadata_skip_independently() {
        let fixture = Fixture::new();
        fixture.store.insert("caches/deadbeef", "old");
        let uploader = fixture.uploader(&[BundleKind::Caches], HistoryPolicy::OnSuccess);

        let report = uploader.upload().unwrap();

        assert_eq!(
            report.transfers.iter().map(|t| t.address.as_str()).collect::<Vec<_>>(),
            vec!["caches/deadbeef", "metadata/deadbeef"]
        );
        assert!(!report.transfers[0].is_uploaded());
        assert!(report.transfers[1].is_uploaded());
        assert_eq!(fixture.store.get("caches/deadbeef").unwrap(), b"old".to_vec());
    }

    #[test]
    fn unreadable_source_state_fails_parts_bundle() {
        let fixture = Fixture::new();
        fs::remove_file(fixture.layout().sources_state_file).unwrap();
        let uploader = fixture.uploader(&[BundleKind::Parts, BundleKind::Out], HistoryPolicy::Always);

        let report = uploader.upload().unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].label, "parts");
        assert!(fixture.store.exists("out/deadbeef").unwrap());
    }

    #[test]
    fn settings_follow_config() {
        let mut config = Config::default();
        config.upload.workers = 7;
        config.upload.bundles = vec![BundleKind::Dist];
        config.upload.history_policy = HistoryPolicy::Always;

        let settings = UploadSettings::from_config(&config);
        assert_eq!(settings.executor.workers, 7);
        assert_eq!(settings.executor.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.bundles, vec![BundleKind::Dist]);
        assert_eq!(settings.history_policy, HistoryPolicy::Always);
        assert_eq!(settings.groups.len(), 2);
    }

    #[test]
    fn missing_commit_fails_before_any_request() {
        let fixture = Fixture::new();
        fs::remove_file(fixture.temp.path().join("git.branch")).unwrap();
        let uploader = fixture.uploader(BundleKind::all(), HistoryPolicy::Always);

        assert!(matches!(uploader.upload(), Err(SyncError::CommitIdMissing(_))));
        assert_eq!(fixture.store.put_count(), 0);
    }

    #[test]
    fn dry_run_plans_without_packing_or_writing() {
        let fixture = Fixture::new().with_all_dirs();
        fixture.store.insert("out/deadbeef", "old");
        let mut settings = fixture.settings(BundleKind::all(), HistoryPolicy::OnSuccess);
        settings.dry_run = true;

        let report = fixture.uploader_with(settings).upload().unwrap();

        assert!(report.is_complete());
        assert_eq!(fixture.store.put_count(), 0);
        assert_eq!(report.uploaded().count(), 0);
        assert_eq!(report.skipped().count(), 1);
        assert_eq!(report.planned().count(), 5);
        assert_eq!(report.history, HistoryUpdate::Planned { added: true });
        assert!(!fixture.store.exists(COMMIT_HISTORY_ADDRESS).unwrap());
        assert_eq!(fs::read_dir(fixture.layout().scratch_dir).unwrap().count(), 0);
    }

    #[test]
    fn dry_run_still_reports_missing_directories() {
        let fixture = Fixture::new();
        let mut settings = fixture.settings(&[BundleKind::Dist], HistoryPolicy::OnSuccess);
        settings.dry_run = true;

        let report = fixture.uploader_with(settings).upload().unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, SyncError::ArtifactMissing(_)));
        assert!(matches!(report.history, HistoryUpdate::Skipped { .. }));
    }

    #[test]
    fn archives_are_cleaned_up() {
        let fixture = Fixture::new();
        let uploader = fixture.uploader(BundleKind::all(), HistoryPolicy::Always);

        uploader.upload().unwrap();

        let scratch = fixture.layout().scratch_dir;
        assert_eq!(fs::read_dir(scratch).unwrap().count(), 0);
    }
}
