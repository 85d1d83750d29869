//! Remote blob store access
//!
//! Provides a trait for the three protocol operations the uploader needs,
//! implemented over HTTP for real runs and in memory for tests.
//!
//! | Operation | Method | Success | Not found |
//! |-----------|--------|---------|-----------|
//! | exists | GET (body discarded) | 200 | 404 |
//! | upload | PUT | 2xx | - |
//! | fetch_text | GET | 200 | - |

pub mod http;
pub mod memory;

pub use http::HttpBlobStore;
pub use memory::MemoryStore;

use crate::error::SyncResult;
use std::path::Path;

/// Abstract blob store interface
///
/// Implementations are shared by every upload worker, so they must be
/// usable from several threads at once.
pub trait BlobStore: Send + Sync {
    /// Check whether an address is present. Any status other than
    /// found/not-found is an error.
    fn exists(&self, address: &str) -> SyncResult<bool>;

    /// Write a local file to an address, overwriting whatever is there.
    /// Does not check existence first.
    fn upload(&self, address: &str, local: &Path) -> SyncResult<()>;

    /// Read a small UTF-8 blob
    fn fetch_text(&self, address: &str) -> SyncResult<String>;

    /// Human-readable location for display
    fn location(&self) -> String;
}
