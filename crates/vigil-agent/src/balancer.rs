// SPDX-License-Identifier: Apache-2.0

//! Keeps the dataset at its target logical size.
//!
//! One call either shrinks (sampled deletes) or grows (parallel uploads of
//! generated files), never both. Growth is reported in physical bytes, i.e.
//! scaled by the redundancy the store reports at the time of the call.

use rand::Rng;
use tracing::{debug, info};
use vigil_core::{human_readable_size, AuditError, StageFailure, DEFAULT_CHUNK_SIZE};
use vigil_model::{total_size, RedundancySettings};

use crate::config::SizeBounds;
use crate::deletion::{delete_batch, Removal};
use crate::generator::generate;
use crate::pool::TaskPool;
use crate::sampler::{list_dataset, select_batch};
use crate::ServiceContext;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BalanceReport {
    /// Physical bytes uploaded (logical size × redundancy factor).
    pub added: u64,
    pub added_logical: u64,
    pub uploaded_files: usize,
    /// Logical bytes deleted to shrink toward the target.
    pub removed: u64,
    pub removed_files: usize,
}

impl BalanceReport {
    #[must_use]
    pub fn made_progress(&self) -> bool {
        self.uploaded_files > 0 || self.removed_files > 0
    }

    fn from_removal(removal: Removal) -> Self {
        Self {
            removed: removal.bytes,
            removed_files: removal.files,
            ..Self::default()
        }
    }

    fn from_uploads(logical_sizes: &[u64], redundancy: RedundancySettings) -> Self {
        let added_logical: u64 = logical_sizes.iter().sum();
        Self {
            added: logical_sizes
                .iter()
                .map(|s| redundancy.physical_bytes(*s))
                .sum(),
            added_logical,
            uploaded_files: logical_sizes.len(),
            ..Self::default()
        }
    }
}

/// Random file sizes within `bounds` that together cover `missing` bytes.
/// At least one file is planned. Every file but the last lies within
/// `bounds`; the last one may fall below `bounds.min`.
pub fn plan_file_sizes<R: Rng + ?Sized>(missing: u64, bounds: SizeBounds, rng: &mut R) -> Vec<u64> {
    let mut remaining = missing.max(bounds.min);
    let mut sizes = Vec::new();
    while remaining > 0 {
        let upper = remaining.min(bounds.max);
        let size = if upper <= bounds.min {
            upper
        } else {
            rng.gen_range(bounds.min..=upper)
        };
        sizes.push(size);
        remaining = remaining.saturating_sub(size);
    }
    sizes
}

pub async fn ensure(
    ctx: &ServiceContext,
    target: u64,
) -> Result<BalanceReport, StageFailure<BalanceReport>> {
    let entries = list_dataset(ctx).await?;
    let mut current = total_size(&entries);
    debug!(
        current = %human_readable_size(current),
        target = %human_readable_size(target),
        "balancing dataset"
    );

    let mut removal = Removal::default();
    if current > target {
        let excess = current - target;
        let batch = select_batch(entries, excess, &mut rand::thread_rng());
        info!(
            files = batch.len(),
            excess = %human_readable_size(excess),
            "dataset above target, shrinking"
        );
        removal = delete_batch(ctx, &batch)
            .await
            .map_err(|f| f.map(BalanceReport::from_removal))?;
        if removal.skipped > 0 {
            info!(skipped = removal.skipped, "some objects were already gone");
        }
        current = total_size(&list_dataset(ctx).await.map_err(|e| {
            StageFailure::new(BalanceReport::from_removal(removal), e)
        })?);
    }

    if removal.files > 0 || current >= target {
        return Ok(BalanceReport::from_removal(removal));
    }

    let redundancy = ctx
        .bounded(
            None,
            "fetching redundancy settings",
            ctx.store.redundancy_settings(),
        )
        .await
        .map_err(|e| e.context("failed to refresh redundancy"))?;
    let sizes = plan_file_sizes(
        target - current,
        ctx.config.size_bounds(),
        &mut rand::thread_rng(),
    );
    info!(
        files = sizes.len(),
        missing = %human_readable_size(target - current),
        redundancy = redundancy.factor(),
        "dataset below target, growing"
    );

    let pool = TaskPool::new(ctx.config.upload_concurrency);
    let factor = redundancy.factor();
    let uploaded = pool
        .run(sizes, |size| upload_file(ctx.clone(), size, factor))
        .await
        .map_err(|f| {
            f.map(|done| BalanceReport::from_uploads(&done, redundancy))
        })?;
    Ok(BalanceReport::from_uploads(&uploaded, redundancy))
}

/// Generates one file of `size` bytes, uploads it under its content address
/// and returns its logical size. The local copy is removed on every path.
async fn upload_file(ctx: ServiceContext, size: u64, factor: f64) -> Result<u64, AuditError> {
    let generated = generate(ctx.scratch_dir().to_path_buf(), size, DEFAULT_CHUNK_SIZE)
        .await
        .map_err(|e| e.context("failed to create file"))?;
    let key = ctx.object_key(&generated.digest());
    let file = tokio::fs::File::open(generated.path()).await?;
    let physical = (size as f64 * factor) as u64;
    ctx.bounded(
        Some(physical),
        "uploading a file",
        ctx.store.put_object(ctx.bucket(), &key, file),
    )
    .await
    .map_err(|e| e.context(&format!("failed to upload file '{key}'")))?;
    debug!(key = %key, size = %human_readable_size(size), "uploaded file");
    Ok(size)
}
