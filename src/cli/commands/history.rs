//! History command - inspect the remote commit history

use crate::cli::args::{HistoryArgs, OutputFormat};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::history::{BlobHistoryIndex, CommitHistory, HistoryIndex};
use crate::store::BlobStore;
use crate::ui::{self, UiContext};
use serde_json::json;
use std::sync::Arc;

/// Execute the history command
pub async fn execute(args: HistoryArgs, config: &Config) -> SyncResult<()> {
    let store: Arc<dyn BlobStore> = Arc::new(super::open_store(&args.server, config)?);
    let index = BlobHistoryIndex::new(store, std::env::temp_dir());

    let history = tokio::task::spawn_blocking(move || index.load())
        .await
        .map_err(|e| SyncError::Internal(format!("history task failed: {}", e)))??;

    let explicit_repo = args.repo.is_some();
    let repository = args
        .repo
        .unwrap_or_else(|| config.upload.repository_url.clone());

    match args.commit {
        Some(commit) => check_commit(&history, &repository, &commit, args.format),
        None => {
            list(&history, &repository, explicit_repo, args.format)?;
            Ok(())
        }
    }
}

fn check_commit(
    history: &CommitHistory,
    repository: &str,
    commit: &str,
    format: OutputFormat,
) -> SyncResult<()> {
    let cached = history.contains(repository, commit);

    match format {
        OutputFormat::Json => {
            let answer = json!({ "repository": repository, "commit": commit, "cached": cached });
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
        OutputFormat::Plain => println!("{}", cached),
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            if cached {
                ui::step_ok(&ctx, &format!("{} is cached for {}", commit, repository));
            }
        }
    }

    if cached {
        Ok(())
    } else {
        Err(SyncError::User(format!(
            "Commit {} is not cached for {}",
            commit, repository
        )))
    }
}

fn list(
    history: &CommitHistory,
    repository: &str,
    explicit_repo: bool,
    format: OutputFormat,
) -> SyncResult<()> {
    match format {
        OutputFormat::Json => {
            if explicit_repo {
                let commits: Vec<&str> = history.commits(repository).collect();
                let mut single = serde_json::Map::new();
                single.insert(repository.to_string(), json!(commits));
                println!("{}", serde_json::to_string_pretty(&single)?);
            } else {
                println!("{}", serde_json::to_string_pretty(history)?);
            }
        }
        OutputFormat::Plain => {
            for commit in history.commits(repository) {
                println!("{}", commit);
            }
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            if history.is_empty() {
                ui::step_info(&ctx, "No commits recorded yet");
                return Ok(());
            }

            ui::intro(&ctx, "Commit history");
            let repositories: Vec<&str> = if explicit_repo {
                vec![repository]
            } else {
                history.repositories().collect()
            };

            for repo in repositories {
                let commits: Vec<&str> = history.commits(repo).collect();
                ui::section(&ctx, &format!("{} ({} commit(s))", repo, commits.len()));
                for commit in commits {
                    println!("  {}", commit);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> CommitHistory {
        CommitHistory::from_json(r#"{"repo":["c1","c2"],"other":["x"]}"#).unwrap()
    }

    #[test]
    fn cached_commit_succeeds() {
        assert!(check_commit(&history(), "repo", "c2", OutputFormat::Plain).is_ok());
    }

    #[test]
    fn uncached_commit_fails() {
        assert!(matches!(
            check_commit(&history(), "repo", "x", OutputFormat::Plain),
            Err(SyncError::User(_))
        ));
    }
}
