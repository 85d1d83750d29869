//! Combining hash for build targets shared across categories

use crate::error::{SyncError, SyncResult};
use std::io::Cursor;

/// MurmurHash3 x64 128 (seed 0) of the UTF-8 bytes, as 32 lowercase hex digits.
///
/// Digest bytes are `h1` then `h2`, each little-endian, which is the
/// rendering other build tooling uses for the same hash.
pub fn combined_hash(content: &str) -> SyncResult<String> {
    let value = murmur3::murmur3_x64_128(&mut Cursor::new(content.as_bytes()), 0)
        .map_err(|e| SyncError::io("hashing fingerprint", e))?;
    Ok(hex::encode(value.to_le_bytes()))
}

/// Hash the ordered concatenation of several recorded hashes
pub fn combine<'a>(hashes: impl IntoIterator<Item = &'a str>) -> SyncResult<String> {
    let joined: String = hashes.into_iter().collect();
    combined_hash(&joined)
}
