// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use tokio::task::JoinSet;
use tracing::debug;
use vigil_core::{AuditError, StageFailure};

/// Runs tasks with at most `workers` in flight. The first error cancels
/// everything still running; values from tasks that finished before it are
/// kept.
#[derive(Debug, Clone, Copy)]
pub struct TaskPool {
    workers: usize,
}

impl TaskPool {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn run<I, F, Fut, T>(&self, items: I, task: F) -> Result<Vec<T>, StageFailure<Vec<T>>>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<T, AuditError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut pending = items.into_iter();
        let mut running = JoinSet::new();
        for item in pending.by_ref().take(self.workers) {
            running.spawn(task(item));
        }

        let mut completed = Vec::new();
        while let Some(joined) = running.join_next().await {
            let error = match joined {
                Ok(Ok(value)) => {
                    completed.push(value);
                    if let Some(item) = pending.next() {
                        running.spawn(task(item));
                    }
                    continue;
                }
                Ok(Err(err)) => err,
                Err(join_err) => AuditError::internal(format!("worker task failed: {join_err}")),
            };
            debug!(
                outstanding = running.len(),
                completed = completed.len(),
                "cancelling outstanding tasks after first error"
            );
            running.shutdown().await;
            return Err(StageFailure::new(completed, error));
        }
        Ok(completed)
    }
}
