#![forbid(unsafe_code)]
//! Remote store capabilities consumed by the auditing agent, with a renterd
//! HTTP backend and an in-memory fake.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWrite;
use vigil_core::AuditError;
use vigil_model::{Alert, ObjectEntry, PrunableContract, ReclaimOutcome, RedundancySettings};

mod fake;
mod renterd;
mod retry;

pub use fake::{FakeStore, RecordingAlertSink, FAKE_CONTRACT_ID};
pub use renterd::{RenterdBackend, RenterdEndpoints, LIST_PAGE_LIMIT};
pub use retry::{is_retryable_status, BackoffPolicy, RetryPolicy};

pub const CRATE_NAME: &str = "vigil-store";

/// Upload, download, listing and space management on the remote store.
///
/// Implementations do not enforce deadlines; callers wrap each call.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Connectivity probe. Fails with `store_unreachable` when the store
    /// cannot be reached at all.
    async fn ping(&self) -> Result<(), AuditError>;

    /// Uploads the whole of `file` under `key`, returning the bytes sent.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        file: tokio::fs::File,
    ) -> Result<u64, AuditError>;

    /// Streams the object into `sink`, returning the bytes written.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, AuditError>;

    /// Deletes one object, or every object under `key` when `recursive`.
    /// A missing target fails with `not_found`.
    async fn delete_object(&self, bucket: &str, key: &str, recursive: bool)
        -> Result<(), AuditError>;

    async fn list_objects(&self, bucket: &str, prefix: &str)
        -> Result<Vec<ObjectEntry>, AuditError>;

    async fn redundancy_settings(&self) -> Result<RedundancySettings, AuditError>;

    async fn prunable_space(&self) -> Result<Vec<PrunableContract>, AuditError>;

    async fn reclaim(
        &self,
        contract_id: &str,
        budget: Duration,
    ) -> Result<ReclaimOutcome, AuditError>;
}

#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    async fn publish(&self, alert: &Alert) -> Result<(), AuditError>;
}
