// SPDX-License-Identifier: Apache-2.0

use rand::seq::SliceRandom;
use rand::Rng;
use vigil_core::AuditError;
use vigil_model::ObjectEntry;

use crate::ServiceContext;

/// Shuffles `entries` and keeps the shortest prefix whose sizes add up to at
/// least `requested`. Everything is returned when the total falls short; a
/// zero request selects nothing.
pub fn select_batch<R: Rng + ?Sized>(
    mut entries: Vec<ObjectEntry>,
    requested: u64,
    rng: &mut R,
) -> Vec<ObjectEntry> {
    if requested == 0 {
        return Vec::new();
    }
    entries.shuffle(rng);
    let mut cumulative = 0_u64;
    let mut keep = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        cumulative = cumulative.saturating_add(entry.size);
        if cumulative >= requested {
            keep = i + 1;
            break;
        }
    }
    entries.truncate(keep);
    entries
}

/// Full listing of the dataset namespace.
pub async fn list_dataset(ctx: &ServiceContext) -> Result<Vec<ObjectEntry>, AuditError> {
    ctx.bounded(
        None,
        "listing the dataset",
        ctx.store.list_objects(ctx.bucket(), ctx.namespace()),
    )
    .await
    .map_err(|e| e.context("failed to fetch dataset entries"))
}

pub async fn sample(ctx: &ServiceContext, requested: u64) -> Result<Vec<ObjectEntry>, AuditError> {
    let entries = list_dataset(ctx).await?;
    Ok(select_batch(entries, requested, &mut rand::thread_rng()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entries(sizes: &[u64]) -> Vec<ObjectEntry> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, s)| ObjectEntry::new(format!("data/{i:02}.data"), *s))
            .collect()
    }

    #[test]
    fn zero_request_is_empty() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(select_batch(entries(&[1, 2, 3]), 0, &mut rng).is_empty());
    }

    #[test]
    fn short_dataset_returns_everything() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(select_batch(entries(&[1, 2, 3]), 100, &mut rng).len(), 3);
    }

    #[test]
    fn stops_as_soon_as_threshold_is_reached() {
        let mut rng = StdRng::seed_from_u64(11);
        let batch = select_batch(entries(&[5; 10]), 12, &mut rng);
        assert_eq!(batch.len(), 3);
    }
}
