// SPDX-License-Identifier: Apache-2.0

use crate::{AlertSink, ObjectStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use vigil_core::{AuditError, ErrorCode};
use vigil_model::{Alert, ObjectEntry, PrunableContract, ReclaimOutcome, RedundancySettings};

pub const FAKE_CONTRACT_ID: &str = "fake-contract";

/// In-memory store. Deleted bytes accumulate as prunable space on
/// [`FAKE_CONTRACT_ID`] until reclaimed. Further contracts can be added with
/// [`FakeStore::with_contracts`]; they are reported after it, in order.
pub struct FakeStore {
    pub objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    pub redundancy: Mutex<RedundancySettings>,
    pub prunable: AtomicU64,
    pub unreachable: AtomicBool,
    pub fail_reclaim: AtomicBool,
    pub put_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub prunable_calls: AtomicUsize,
    pub reclaim_calls: AtomicUsize,
    /// Contract ids passed to `reclaim`, in call order.
    pub reclaim_log: Mutex<Vec<String>>,
    contracts: Mutex<Vec<PrunableContract>>,
    failing_contract: Option<String>,
    fail_put_after: Option<usize>,
    fail_delete_after: Option<usize>,
    put_delay: Duration,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            redundancy: Mutex::new(RedundancySettings::default()),
            prunable: AtomicU64::new(0),
            unreachable: AtomicBool::new(false),
            fail_reclaim: AtomicBool::new(false),
            put_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            prunable_calls: AtomicUsize::new(0),
            reclaim_calls: AtomicUsize::new(0),
            reclaim_log: Mutex::new(Vec::new()),
            contracts: Mutex::new(Vec::new()),
            failing_contract: None,
            fail_put_after: None,
            fail_delete_after: None,
            put_delay: Duration::ZERO,
        }
    }
}

impl FakeStore {
    #[must_use]
    pub fn with_redundancy(self, min_shards: u32, total_shards: u32) -> Self {
        Self {
            redundancy: Mutex::new(RedundancySettings {
                min_shards,
                total_shards,
            }),
            ..self
        }
    }

    /// Every upload after the first `n` fails with a store error.
    #[must_use]
    pub fn with_put_failure_after(mut self, n: usize) -> Self {
        self.fail_put_after = Some(n);
        self
    }

    /// Every delete after the first `n` fails with a store error.
    #[must_use]
    pub fn with_delete_failure_after(mut self, n: usize) -> Self {
        self.fail_delete_after = Some(n);
        self
    }

    /// Extra contracts holding `(id, prunable)` bytes, zero included.
    #[must_use]
    pub fn with_contracts(self, contracts: &[(&str, u64)]) -> Self {
        let contracts = contracts
            .iter()
            .map(|(id, prunable)| PrunableContract {
                id: (*id).to_string(),
                prunable: *prunable,
                size: *prunable,
            })
            .collect();
        Self {
            contracts: Mutex::new(contracts),
            ..self
        }
    }

    /// Reclaiming `contract_id` fails with a store error.
    #[must_use]
    pub fn with_failing_contract(mut self, contract_id: &str) -> Self {
        self.failing_contract = Some(contract_id.to_string());
        self
    }

    /// Bytes still prunable on an extra contract.
    pub async fn contract_prunable(&self, contract_id: &str) -> Option<u64> {
        self.contracts
            .lock()
            .await
            .iter()
            .find(|c| c.id == contract_id)
            .map(|c| c.prunable)
    }

    #[must_use]
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = delay;
        self
    }

    pub async fn insert(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), key.to_string()), bytes);
    }

    pub async fn bytes(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Flips the first byte of a stored object. Returns false if it is absent
    /// or empty.
    pub async fn corrupt(&self, bucket: &str, key: &str) -> bool {
        let mut objects = self.objects.lock().await;
        match objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .and_then(|b| b.first_mut())
        {
            Some(byte) => {
                *byte ^= 0xff;
                true
            }
            None => false,
        }
    }

    pub async fn logical_size(&self, bucket: &str) -> u64 {
        self.objects
            .lock()
            .await
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .map(|(_, v)| v.len() as u64)
            .sum()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }

    fn check_reachable(&self) -> Result<(), AuditError> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(AuditError::new(
                ErrorCode::StoreUnreachable,
                "fake store is unreachable",
            ));
        }
        Ok(())
    }
}

fn under_prefix(key: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_matches('/');
    prefix.is_empty()
        || key
            .trim_start_matches('/')
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl ObjectStore for FakeStore {
    fn backend_tag(&self) -> &'static str {
        "fake"
    }

    async fn ping(&self) -> Result<(), AuditError> {
        self.check_reachable()
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut file: tokio::fs::File,
    ) -> Result<u64, AuditError> {
        self.check_reachable()?;
        let call = self.put_calls.fetch_add(1, Ordering::Relaxed);
        if !self.put_delay.is_zero() {
            tokio::time::sleep(self.put_delay).await;
        }
        if self.fail_put_after.is_some_and(|n| call >= n) {
            return Err(AuditError::new(
                ErrorCode::Store,
                format!("upload of '{key}' rejected"),
            ));
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;
        let size = bytes.len() as u64;
        self.insert(bucket, key, bytes).await;
        Ok(size)
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, AuditError> {
        self.check_reachable()?;
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let bytes = self.bytes(bucket, key).await.ok_or_else(|| {
            AuditError::new(ErrorCode::NotFound, format!("object '{key}' not found"))
        })?;
        sink.write_all(&bytes).await?;
        sink.flush().await?;
        Ok(bytes.len() as u64)
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        recursive: bool,
    ) -> Result<(), AuditError> {
        self.check_reachable()?;
        let call = self.delete_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_delete_after.is_some_and(|n| call >= n) {
            return Err(AuditError::new(
                ErrorCode::Store,
                format!("delete of '{key}' rejected"),
            ));
        }
        let mut objects = self.objects.lock().await;
        let doomed: Vec<(String, String)> = objects
            .keys()
            .filter(|(b, k)| {
                b == bucket && (k == key || (recursive && under_prefix(k, key)))
            })
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Err(AuditError::new(
                ErrorCode::NotFound,
                format!("object '{key}' not found"),
            ));
        }
        let mut freed = 0_u64;
        for id in doomed {
            if let Some(bytes) = objects.remove(&id) {
                freed += bytes.len() as u64;
            }
        }
        let factor = self.redundancy.lock().await.factor();
        self.prunable
            .fetch_add((freed as f64 * factor) as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectEntry>, AuditError> {
        self.check_reachable()?;
        Ok(self
            .objects
            .lock()
            .await
            .iter()
            .filter(|((b, k), _)| b == bucket && under_prefix(k, prefix))
            .map(|((_, k), v)| ObjectEntry::new(k.clone(), v.len() as u64))
            .collect())
    }

    async fn redundancy_settings(&self) -> Result<RedundancySettings, AuditError> {
        self.check_reachable()?;
        Ok(*self.redundancy.lock().await)
    }

    async fn prunable_space(&self) -> Result<Vec<PrunableContract>, AuditError> {
        self.check_reachable()?;
        self.prunable_calls.fetch_add(1, Ordering::Relaxed);
        let mut contracts = Vec::new();
        let prunable = self.prunable.load(Ordering::Relaxed);
        if prunable > 0 {
            contracts.push(PrunableContract {
                id: FAKE_CONTRACT_ID.to_string(),
                prunable,
                size: prunable,
            });
        }
        contracts.extend(self.contracts.lock().await.iter().cloned());
        Ok(contracts)
    }

    async fn reclaim(
        &self,
        contract_id: &str,
        _budget: Duration,
    ) -> Result<ReclaimOutcome, AuditError> {
        self.check_reachable()?;
        self.reclaim_calls.fetch_add(1, Ordering::Relaxed);
        self.reclaim_log.lock().await.push(contract_id.to_string());
        if self.fail_reclaim.load(Ordering::Relaxed)
            || self.failing_contract.as_deref() == Some(contract_id)
        {
            return Err(AuditError::new(
                ErrorCode::Store,
                format!("failed to prune contract {contract_id}"),
            ));
        }
        let reclaimed = if contract_id == FAKE_CONTRACT_ID {
            self.prunable.swap(0, Ordering::Relaxed)
        } else {
            let mut contracts = self.contracts.lock().await;
            let contract = contracts
                .iter_mut()
                .find(|c| c.id == contract_id)
                .ok_or_else(|| {
                    AuditError::new(
                        ErrorCode::NotFound,
                        format!("contract {contract_id} not found"),
                    )
                })?;
            std::mem::take(&mut contract.prunable)
        };
        Ok(ReclaimOutcome {
            reclaimed,
            remaining: 0,
        })
    }
}

/// Alert sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingAlertSink {
    pub alerts: Mutex<Vec<Alert>>,
    pub fail: AtomicBool,
}

impl RecordingAlertSink {
    pub async fn published(&self) -> Vec<Alert> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn publish(&self, alert: &Alert) -> Result<(), AuditError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(AuditError::new(ErrorCode::Store, "alert rejected"));
        }
        self.alerts.lock().await.push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::under_prefix;

    #[test]
    fn prefix_matches_whole_path_segments() {
        assert!(under_prefix("data/ab.data", "data"));
        assert!(under_prefix("/data/ab.data", "/data/"));
        assert!(!under_prefix("database/ab.data", "data"));
        assert!(under_prefix("anything", ""));
    }
}
