#![forbid(unsafe_code)]
//! The auditing agent: keeps a synthetic dataset at its target size on the
//! remote store, samples it for hash-verified downloads, ages data out and
//! records every cycle.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vigil_core::{AuditError, ContentDigest, TimeoutPolicy};
use vigil_store::{AlertSink, ObjectStore};

pub mod alerts;
pub mod balancer;
pub mod config;
pub mod deletion;
pub mod generator;
pub mod orchestrator;
pub mod pool;
pub mod pruner;
pub mod sampler;
pub mod state_store;
pub mod verifier;

pub use config::{AgentConfig, SizeBounds, DEFAULT_CONFIG_PATH};
pub use orchestrator::{CycleOrchestrator, CyclePhase};
pub use state_store::StateStore;

pub const CRATE_NAME: &str = "vigil-agent";

/// Everything a cycle needs, built once at startup and cloned into tasks.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn ObjectStore>,
    pub alerts: Arc<dyn AlertSink>,
    pub config: Arc<AgentConfig>,
    pub timeouts: TimeoutPolicy,
}

impl ServiceContext {
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        alerts: Arc<dyn AlertSink>,
        config: AgentConfig,
    ) -> Self {
        Self {
            store,
            alerts,
            config: Arc::new(config),
            timeouts: TimeoutPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// The dataset namespace on the store, without surrounding slashes.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.config.work_dir.trim_matches('/')
    }

    #[must_use]
    pub fn object_key(&self, digest: &ContentDigest) -> String {
        format!("{}/{}", self.namespace(), digest.file_name())
    }

    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.config.scratch_dir
    }

    /// Runs `fut` under the deadline the timeout policy assigns to a call
    /// moving `size` bytes.
    pub async fn bounded<T, F>(&self, size: Option<u64>, what: &str, fut: F) -> Result<T, AuditError>
    where
        F: Future<Output = Result<T, AuditError>>,
    {
        with_deadline(self.timeouts.deadline(size), what, fut).await
    }
}

/// Fails with `timeout` when `fut` does not finish within `budget`.
pub async fn with_deadline<T, F>(budget: Duration, what: &str, fut: F) -> Result<T, AuditError>
where
    F: Future<Output = Result<T, AuditError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(outcome) => outcome,
        Err(_) => Err(AuditError::timeout(format!(
            "{what} did not finish within {budget:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ErrorCode;

    #[tokio::test]
    async fn deadline_elapses_into_timeout_error() {
        let err = with_deadline(Duration::from_millis(10), "list objects", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AuditError>(())
        })
        .await
        .expect_err("must time out");
        assert_eq!(err.code, ErrorCode::Timeout);
        assert!(err.message.starts_with("list objects"));
        assert!(err.message.ends_with("within 10ms"), "{}", err.message);
    }

    #[tokio::test]
    async fn inner_errors_pass_through() {
        let err = with_deadline(Duration::from_secs(1), "ping", async {
            Err::<(), _>(AuditError::new(ErrorCode::StoreUnreachable, "down"))
        })
        .await
        .expect_err("inner error");
        assert_eq!(err.code, ErrorCode::StoreUnreachable);
    }
}
