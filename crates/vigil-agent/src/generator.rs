// SPDX-License-Identifier: Apache-2.0

//! Synthetic content-addressed files.
//!
//! Random bytes are written to an anonymous temp file in the scratch
//! directory and hashed on the way out. Only once every byte is on disk is
//! the file renamed to `<digest>.data`, so a named file in scratch always
//! matches its name. Any failure leaves nothing behind.

use rand::RngCore;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use vigil_core::{AuditError, ContentDigest, DigestHasher};

/// A generated file on local disk. Dropping it removes the file.
#[derive(Debug)]
pub struct GeneratedFile {
    path: PathBuf,
    digest: ContentDigest,
    size: u64,
}

impl GeneratedFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn digest(&self) -> ContentDigest {
        self.digest
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for GeneratedFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Writes exactly `size` random bytes in pieces of at most `chunk_size`.
pub fn generate_blocking(
    dir: &Path,
    size: u64,
    chunk_size: usize,
) -> Result<GeneratedFile, AuditError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AuditError::local_io(format!("failed to create {}: {e}", dir.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| AuditError::local_io(format!("failed to create temp file: {e}")))?;

    let buf_len = usize::try_from(size)
        .unwrap_or(usize::MAX)
        .min(chunk_size.max(1));
    let mut buf = vec![0_u8; buf_len];
    let mut rng = rand::thread_rng();
    let mut hasher = DigestHasher::new();
    let mut remaining = size;
    while remaining > 0 {
        let n = usize::try_from(remaining).unwrap_or(usize::MAX).min(buf_len);
        let chunk = &mut buf[..n];
        rng.fill_bytes(chunk);
        hasher.update(chunk);
        tmp.write_all(chunk)?;
        remaining -= n as u64;
    }
    tmp.as_file().sync_all()?;

    let digest = hasher.finalize();
    let path = dir.join(digest.file_name());
    tmp.persist(&path)
        .map_err(|e| AuditError::local_io(format!("failed to rename temp file: {}", e.error)))?;
    debug!(path = %path.display(), size, "generated file");
    Ok(GeneratedFile { path, digest, size })
}

/// [`generate_blocking`] on the blocking pool.
pub async fn generate(
    dir: PathBuf,
    size: u64,
    chunk_size: usize,
) -> Result<GeneratedFile, AuditError> {
    tokio::task::spawn_blocking(move || generate_blocking(&dir, size, chunk_size))
        .await
        .map_err(|e| AuditError::internal(format!("file generation task failed: {e}")))?
}
