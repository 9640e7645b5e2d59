use tracing::{debug, warn};
use vigil_core::{AuditError, ErrorCode, StageFailure};
use vigil_model::ObjectEntry;

use crate::ServiceContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removal {
    /// Logical bytes of the objects actually deleted.
    pub bytes: u64,
    pub files: usize,
    /// Objects that were already gone.
    pub skipped: usize,
}

/// Deletes `batch` one object at a time. Objects that no longer exist are
/// skipped; any other error stops the batch.
pub async fn delete_batch(
    ctx: &ServiceContext,
    batch: &[ObjectEntry],
) -> Result<Removal, StageFailure<Removal>> {
    let mut removal = Removal::default();
    for entry in batch {
        let deleted = ctx
            .bounded(
                None,
                "deleting an object",
                ctx.store.delete_object(ctx.bucket(), &entry.key, false),
            )
            .await;
        match deleted {
            Ok(()) => {
                removal.bytes += entry.size;
                removal.files += 1;
                debug!(key = %entry.key, size = entry.size, "deleted object");
            }
            Err(e) if e.is(ErrorCode::NotFound) => {
                removal.skipped += 1;
                warn!(key = %entry.key, "object already gone, skipping");
            }
            Err(e) => {
                return Err(StageFailure::new(
                    removal,
                    e.context(&format!("failed to delete object '{}'", entry.key)),
                ));
            }
        }
    }
    Ok(removal)
}

/// Recursive delete of the whole namespace. A namespace that is already
/// empty is fine.
pub async fn wipe_namespace(ctx: &ServiceContext) -> Result<(), AuditError> {
    let wiped = ctx
        .bounded(
            None,
            "wiping the dataset namespace",
            ctx.store.delete_object(ctx.bucket(), ctx.namespace(), true),
        )
        .await;
    match wiped {
        Ok(()) => Ok(()),
        Err(e) if e.is(ErrorCode::NotFound) => Ok(()),
        Err(e) => Err(e.context("failed to clean the dataset namespace")),
    }
}
