// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::path::{Path, PathBuf};
use vigil_core::AuditError;
use vigil_model::IntegrityState;

/// The JSON state file. Writes go to a sibling temp file that is renamed
/// over the target, so readers never see a partial document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or empty file is an empty state.
    pub async fn load(&self) -> Result<IntegrityState, AuditError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IntegrityState::default())
            }
            Err(e) => {
                return Err(AuditError::local_io(format!(
                    "failed to open state file at '{}': {e}",
                    self.path.display()
                )))
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(IntegrityState::default());
        }
        let mut state: IntegrityState = serde_json::from_slice(&raw).map_err(|e| {
            AuditError::local_io(format!(
                "failed to decode state file at '{}': {e}",
                self.path.display()
            ))
        })?;
        state.normalize();
        Ok(state)
    }

    pub async fn save(&self, state: &IntegrityState) -> Result<(), AuditError> {
        let mut bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| AuditError::internal(format!("failed to encode state: {e}")))?;
        bytes.push(b'\n');
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| AuditError::internal(format!("state write task failed: {e}")))?
    }

    /// Replaces whatever is on disk with an empty state.
    pub async fn reset(&self) -> Result<IntegrityState, AuditError> {
        let state = IntegrityState::default();
        self.save(&state).await?;
        Ok(state)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AuditError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| {
        AuditError::local_io(format!(
            "failed to replace state file at '{}': {}",
            path.display(),
            e.error
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_model::CycleResult;

    #[tokio::test]
    async fn missing_and_empty_files_load_as_empty_state() {
        let dir = tempfile::tempdir().expect("tmp");
        let store = StateStore::new(dir.path().join("integrity.json"));
        assert_eq!(store.load().await.expect("missing"), IntegrityState::default());

        tokio::fs::write(store.path(), b"\n").await.expect("write");
        assert_eq!(store.load().await.expect("empty"), IntegrityState::default());
    }

    #[tokio::test]
    async fn save_then_load_preserves_results() {
        let dir = tempfile::tempdir().expect("tmp");
        let store = StateStore::new(dir.path().join("nested").join("integrity.json"));
        let mut state = IntegrityState::default();
        state.record(CycleResult::started(Utc::now()));
        store.save(&state).await.expect("save");
        let loaded = store.load().await.expect("load");
        assert_eq!(loaded.results.len(), 1);
        assert!(loaded.ok);
        // only the state file remains in the directory
        let names: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .expect("ls")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn garbage_is_reported_not_replaced() {
        let dir = tempfile::tempdir().expect("tmp");
        let store = StateStore::new(dir.path().join("integrity.json"));
        tokio::fs::write(store.path(), b"{not json").await.expect("write");
        assert!(store.load().await.is_err());
        let reset = store.reset().await.expect("reset");
        assert!(reset.results.is_empty());
        assert_eq!(store.load().await.expect("load"), reset);
    }
}
