#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use vigil_agent::{AgentConfig, ServiceContext};
use vigil_core::{ContentDigest, KIB};
use vigil_store::{FakeStore, RecordingAlertSink};

pub const BUCKET: &str = "default";
pub const TARGET: u64 = 64 * KIB;

pub fn config(dir: &Path) -> AgentConfig {
    AgentConfig {
        dataset_size: TARGET,
        min_file_size: 4 * KIB,
        max_file_size: 16 * KIB,
        download_sample_pct: 25.0,
        delete_sample_pct: 10.0,
        upload_concurrency: 3,
        scratch_dir: dir.join("scratch"),
        state_file: dir.join("state").join("integrity.json"),
        log_file: "".into(),
        ..AgentConfig::default()
    }
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub alerts: Arc<RecordingAlertSink>,
    pub ctx: ServiceContext,
}

pub fn harness(store: FakeStore, config: AgentConfig) -> Harness {
    let store = Arc::new(store);
    let alerts = Arc::new(RecordingAlertSink::default());
    let ctx = ServiceContext::new(store.clone(), alerts.clone(), config);
    Harness { store, alerts, ctx }
}

/// Stores `count` content-addressed objects of `size` bytes each under the
/// dataset namespace and returns their keys.
pub async fn seed(store: &FakeStore, count: usize, size: usize) -> Vec<String> {
    let mut keys = Vec::with_capacity(count);
    for i in 0..count {
        let mut bytes = vec![0_u8; size];
        bytes[..8].copy_from_slice(&(i as u64).to_le_bytes());
        let key = format!("data/{}", ContentDigest::of(&bytes).file_name());
        store.insert(BUCKET, &key, bytes).await;
        keys.push(key);
    }
    keys
}
