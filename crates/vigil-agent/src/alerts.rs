use tracing::{info, warn};
use vigil_core::AuditError;
use vigil_model::{Alert, CycleResult, Severity};

use crate::ServiceContext;

/// Publishes the alert for a finished cycle.
pub async fn raise(ctx: &ServiceContext, result: &CycleResult) -> Result<Alert, AuditError> {
    let alert = Alert::for_cycle(result)
        .map_err(|e| AuditError::internal(format!("failed to build alert: {e}")))?;
    match alert.severity {
        Severity::Critical => warn!(id = %alert.id, message = %alert.message, "registering alert"),
        _ => info!(id = %alert.id, message = %alert.message, "registering alert"),
    }
    ctx.bounded(None, "registering an alert", ctx.alerts.publish(&alert))
        .await
        .map_err(|e| e.context("failed to register alert"))?;
    Ok(alert)
}
