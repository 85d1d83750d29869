//! In-memory blob store

use super::BlobStore;
use crate::error::{SyncError, SyncResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    blobs: BTreeMap<String, Vec<u8>>,
    puts: Vec<String>,
    fetches: usize,
    forced_status: HashMap<String, u16>,
}

/// Blob store kept entirely in process memory.
///
/// Records every PUT so callers can assert on what was written.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a blob without recording a PUT
    pub fn insert(&self, address: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.lock().blobs.insert(address.into(), bytes.into());
    }

    /// Make existence checks on `address` answer with `status`
    pub fn force_status(&self, address: impl Into<String>, status: u16) {
        self.lock().forced_status.insert(address.into(), status);
    }

    /// Stored bytes for an address
    pub fn get(&self, address: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(address).cloned()
    }

    /// Every address written, in PUT order
    pub fn put_log(&self) -> Vec<String> {
        self.lock().puts.clone()
    }

    pub fn put_count(&self) -> usize {
        self.lock().puts.len()
    }

    /// Number of `fetch_text` calls so far
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }
}

impl BlobStore for MemoryStore {
    fn exists(&self, address: &str) -> SyncResult<bool> {
        let inner = self.lock();
        match inner.forced_status.get(address) {
            Some(status) => super::http::probe_status("GET", address, *status),
            None => Ok(inner.blobs.contains_key(address)),
        }
    }

    fn upload(&self, address: &str, local: &Path) -> SyncResult<()> {
        if !local.is_file() {
            return Err(SyncError::ArtifactMissing(local.to_path_buf()));
        }
        let bytes =
            fs::read(local).map_err(|e| SyncError::io(format!("reading {}", local.display()), e))?;

        let mut inner = self.lock();
        inner.blobs.insert(address.to_string(), bytes);
        inner.puts.push(address.to_string());
        Ok(())
    }

    fn fetch_text(&self, address: &str) -> SyncResult<String> {
        let mut inner = self.lock();
        inner.fetches += 1;
        let bytes = inner.blobs.get(address).cloned().ok_or_else(|| SyncError::UnexpectedStatus {
            method: "GET",
            address: address.to_string(),
            status: 404,
        })?;
        String::from_utf8(bytes).map_err(|e| SyncError::Internal(format!("{}: {}", address, e)))
    }

    fn location(&self) -> String {
        "memory://".to_string()
    }
}
