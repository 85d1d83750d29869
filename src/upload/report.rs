//! Outcome of an upload run

use crate::executor::JobFailure;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What happened to one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "action")]
pub enum TransferAction {
    /// Already present remotely
    Skipped,
    /// Written in this run
    Uploaded { bytes: u64 },
    /// Absent remotely; a dry run left it unwritten
    Planned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub address: String,
    #[serde(flatten)]
    pub action: TransferAction,
}

impl Transfer {
    pub fn skipped(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            action: TransferAction::Skipped,
        }
    }

    pub fn uploaded(address: impl Into<String>, bytes: u64) -> Self {
        Self {
            address: address.into(),
            action: TransferAction::Uploaded { bytes },
        }
    }

    pub fn planned(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            action: TransferAction::Planned,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self.action, TransferAction::Uploaded { .. })
    }
}

/// A failed job, rendered for display and JSON output
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub job: String,
    pub error: String,
    pub configuration: bool,
}

impl From<&JobFailure> for FailureRecord {
    fn from(failure: &JobFailure) -> Self {
        Self {
            job: failure.label.clone(),
            error: failure.error.to_string(),
            configuration: failure.error.is_configuration(),
        }
    }
}

/// Result of the commit-history step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum HistoryUpdate {
    /// Commit written to the index (`added` is false if it was already there)
    Recorded { added: bool },
    /// Dry run: the commit would be written (`added` is false if it is already there)
    Planned { added: bool },
    /// Index left untouched
    Skipped { reason: String },
}

/// Everything an upload run did
#[derive(Debug, Serialize)]
pub struct UploadReport {
    pub run_id: Uuid,
    pub commit: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transfers: Vec<Transfer>,
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<JobFailure>,
    pub history: HistoryUpdate,
}

impl UploadReport {
    pub fn uploaded(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.iter().filter(|t| t.is_uploaded())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers
            .iter()
            .filter(|t| t.action == TransferAction::Skipped)
    }

    pub fn planned(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers
            .iter()
            .filter(|t| t.action == TransferAction::Planned)
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.transfers
            .iter()
            .map(|t| match t.action {
                TransferAction::Uploaded { bytes } => bytes,
                TransferAction::Skipped | TransferAction::Planned => 0,
            })
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn serialize_failures<S>(failures: &[JobFailure], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(failures.iter().map(FailureRecord::from))
}
