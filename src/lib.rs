//! cachesync - build cache uploader
//!
//! Uploads incremental compiler caches and compiled outputs of a finished
//! build to a content-addressed HTTP blob store, skipping anything already
//! present, and records the commit in a shared commit history.

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod history;
pub mod project;
pub mod store;
pub mod ui;
pub mod upload;

pub use error::{SyncError, SyncResult};
