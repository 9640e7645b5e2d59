// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};
use tracing::{info, warn};
use vigil_core::{human_readable_size, AuditError, StageFailure};

use crate::deletion::{delete_batch, Removal};
use crate::sampler::sample;
use crate::{with_deadline, ServiceContext};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneReport {
    /// Logical bytes deleted.
    pub removed: u64,
    pub removed_files: usize,
    /// Physical bytes reclaimed from contracts.
    pub reclaimed: u64,
    pub elapsed: Duration,
    /// Set when reclamation stopped early. Deletes are not undone.
    pub reclaim_error: Option<AuditError>,
}

impl PruneReport {
    fn from_removal(removal: Removal, started: Instant) -> Self {
        Self {
            removed: removal.bytes,
            removed_files: removal.files,
            elapsed: started.elapsed(),
            ..Self::default()
        }
    }
}

/// Deletes a random batch of at least `sample_size` bytes, then reclaims the
/// freed space contract by contract.
pub async fn prune(
    ctx: &ServiceContext,
    sample_size: u64,
) -> Result<PruneReport, StageFailure<PruneReport>> {
    let started = Instant::now();
    let batch = sample(ctx, sample_size).await?;
    info!(
        files = batch.len(),
        sample = %human_readable_size(sample_size),
        "pruning dataset sample"
    );
    let removal = delete_batch(ctx, &batch)
        .await
        .map_err(|f| f.map(|r| PruneReport::from_removal(r, started)))?;

    if removal.skipped > 0 {
        info!(skipped = removal.skipped, "some sampled objects were already gone");
    }
    let mut report = PruneReport::from_removal(removal, started);
    match reclaim(ctx).await {
        Ok(reclaimed) => report.reclaimed = reclaimed,
        Err((reclaimed, e)) => {
            warn!(error = %e, "reclaiming space aborted for this cycle");
            report.reclaimed = reclaimed;
            report.reclaim_error = Some(e);
        }
    }
    report.elapsed = started.elapsed();
    info!(
        removed = %human_readable_size(report.removed),
        reclaimed = %human_readable_size(report.reclaimed),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "pruned dataset"
    );
    Ok(report)
}

/// Reclaims every contract with prunable space. Stops at the first failure,
/// returning what was reclaimed before it.
async fn reclaim(ctx: &ServiceContext) -> Result<u64, (u64, AuditError)> {
    let contracts = ctx
        .bounded(None, "fetching prunable data", ctx.store.prunable_space())
        .await
        .map_err(|e| (0, e.context("failed to fetch prunable data")))?;

    let budget = ctx.config.reclaim_timeout();
    let mut reclaimed = 0_u64;
    for contract in contracts.iter().filter(|c| c.prunable > 0) {
        let outcome = with_deadline(
            budget,
            "reclaiming contract space",
            ctx.store.reclaim(&contract.id, budget),
        )
        .await
        .map_err(|e| {
            (
                reclaimed,
                e.context(&format!("failed to prune contract {}", contract.id)),
            )
        })?;
        info!(
            contract = %contract.id,
            pruned = %human_readable_size(outcome.reclaimed),
            remaining = %human_readable_size(outcome.remaining),
            "reclaimed contract space"
        );
        reclaimed += outcome.reclaimed;
    }
    Ok(reclaimed)
}
