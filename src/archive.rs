//! Directory packaging for upload
//!
//! Directories are packed into gzip tarballs inside self-deleting temp
//! files. Entries are written in sorted path order, so one call always
//! produces the same member layout.

use crate::error::{SyncError, SyncResult};
use flate2::{write::GzEncoder, Compression};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

/// A packed directory; the backing file is removed on drop
#[derive(Debug)]
pub struct Archive {
    file: NamedTempFile,
    size: u64,
    sha256: String,
}

impl Archive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

/// Pack `dir` recursively into a temp file under `scratch`.
///
/// `label` only names the temp file.
pub fn pack_directory(dir: &Path, scratch: &Path, label: &str) -> SyncResult<Archive> {
    if !dir.is_dir() {
        return Err(SyncError::ArtifactMissing(dir.to_path_buf()));
    }

    let mut file = tempfile::Builder::new()
        .prefix(&format!("{}-", sanitize(label)))
        .suffix(".tar.gz")
        .tempfile_in(scratch)
        .map_err(|e| SyncError::io(format!("creating archive in {}", scratch.display()), e))?;

    {
        let encoder = GzEncoder::new(BufWriter::new(file.as_file_mut()), Compression::default());
        let mut tar = tar::Builder::new(encoder);

        for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let context = format!("walking {}", dir.display());
                match e.into_io_error() {
                    Some(io) => SyncError::io(context, io),
                    None => SyncError::Internal(context),
                }
            })?;
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| SyncError::Internal(e.to_string()))?;

            let result = if entry.file_type().is_dir() {
                tar.append_dir(relative, entry.path())
            } else {
                tar.append_path_with_name(entry.path(), relative)
            };
            result.map_err(|e| SyncError::io(format!("archiving {}", entry.path().display()), e))?;
        }

        let encoder = tar
            .into_inner()
            .map_err(|e| SyncError::io("finishing tar stream", e))?;
        let mut writer = encoder
            .finish()
            .map_err(|e| SyncError::io("finishing gzip stream", e))?;
        std::io::Write::flush(&mut writer).map_err(|e| SyncError::io("flushing archive", e))?;
    }

    let (size, sha256) = digest(file.as_file_mut())?;
    debug!(
        "Packed {} into {} ({} bytes, sha256 {})",
        dir.display(),
        file.path().display(),
        size,
        sha256
    );

    Ok(Archive { file, size, sha256 })
}

fn digest(file: &mut File) -> SyncResult<(u64, String)> {
    file.seek(SeekFrom::Start(0))
        .map_err(|e| SyncError::io("rewinding archive", e))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| SyncError::io("reading archive", e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }

    Ok((size, hex::encode(hasher.finalize())))
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
