// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, error, info};
use vigil_core::{
    digest_reader, expected_digest_hex, human_readable_size, AuditError, StageFailure,
    DEFAULT_CHUNK_SIZE,
};
use vigil_model::ObjectEntry;

use crate::sampler::sample;
use crate::ServiceContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub downloaded: u64,
    pub verified: usize,
}

/// Downloads a random sample of at least `sample_size` bytes, one object at a
/// time, and checks every object against the digest in its name. Stops at
/// the first mismatch.
pub async fn verify(
    ctx: &ServiceContext,
    sample_size: u64,
) -> Result<VerifyReport, StageFailure<VerifyReport>> {
    let batch = sample(ctx, sample_size).await?;
    info!(
        files = batch.len(),
        sample = %human_readable_size(sample_size),
        "verifying dataset sample"
    );
    let mut report = VerifyReport::default();
    for entry in &batch {
        match verify_entry(ctx, entry).await {
            Ok(bytes) => {
                report.downloaded += bytes;
                report.verified += 1;
            }
            Err(failure) => {
                report.downloaded += failure.completed;
                if failure.error.code.is_critical() {
                    error!(key = %entry.key, error = %failure.error, "integrity violation");
                }
                return Err(StageFailure::new(report, failure.error));
            }
        }
    }
    Ok(report)
}

/// Downloads one object into a scratch temp file and compares its digest
/// with the one its key claims. Returns the bytes downloaded; a mismatch
/// still reports them.
pub async fn verify_entry(
    ctx: &ServiceContext,
    entry: &ObjectEntry,
) -> Result<u64, StageFailure<u64>> {
    let (downloaded, actual) = fetch_and_hash(ctx, entry).await?;
    let expected = expected_digest_hex(&entry.key);
    if actual != expected {
        return Err(StageFailure::new(
            downloaded,
            AuditError::integrity_mismatch(&entry.key, expected, &actual),
        ));
    }
    debug!(key = %entry.key, size = downloaded, "verified object");
    Ok(downloaded)
}

/// Bytes downloaded and the hex digest of what arrived.
async fn fetch_and_hash(
    ctx: &ServiceContext,
    entry: &ObjectEntry,
) -> Result<(u64, String), AuditError> {
    tokio::fs::create_dir_all(ctx.scratch_dir()).await?;
    let tmp = tempfile::NamedTempFile::new_in(ctx.scratch_dir())?;
    let mut sink = tokio::fs::File::from_std(tmp.reopen()?);
    let downloaded = ctx
        .bounded(
            Some(entry.size),
            "downloading a file",
            ctx.store.get_object(ctx.bucket(), &entry.key, &mut sink),
        )
        .await
        .map_err(|e| e.context(&format!("failed to download file '{}'", entry.key)))?;
    drop(sink);

    let chunk_size = usize::try_from(downloaded)
        .unwrap_or(usize::MAX)
        .clamp(1, DEFAULT_CHUNK_SIZE);
    // The temp file moves into the blocking task and is removed there.
    let (actual, _) = tokio::task::spawn_blocking(move || {
        let file = tmp.reopen()?;
        digest_reader(file, chunk_size)
    })
    .await
    .map_err(|e| AuditError::internal(format!("hashing task failed: {e}")))??;
    Ok((downloaded, actual.to_hex()))
}
