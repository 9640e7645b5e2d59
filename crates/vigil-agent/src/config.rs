// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_core::{AuditError, ErrorCode, GIB, MIB};
use vigil_store::RenterdEndpoints;

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Agent configuration, read once at startup from a YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AgentConfig {
    pub bus_address: String,
    pub bus_password: String,
    pub worker_address: String,
    pub worker_password: String,

    pub check_interval_secs: u64,
    /// Share of the target size downloaded and verified per cycle, in percent.
    pub download_sample_pct: f64,
    /// Share of the target size deleted per cycle, in percent.
    pub delete_sample_pct: f64,

    pub dataset_size: u64,
    pub min_file_size: u64,
    pub max_file_size: u64,

    pub clean_start: bool,
    pub work_dir: String,
    pub bucket: String,
    pub scratch_dir: PathBuf,
    pub upload_concurrency: usize,
    pub reclaim_timeout_secs: u64,
    pub state_file: PathBuf,
    /// Empty disables the file log.
    pub log_file: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bus_address: "http://localhost:9880/api/bus".to_string(),
            bus_password: "test".to_string(),
            worker_address: "http://localhost:9880/api/worker".to_string(),
            worker_password: "test".to_string(),
            check_interval_secs: 3600,
            download_sample_pct: 1.0,
            delete_sample_pct: 1.0,
            dataset_size: 10 * GIB,
            min_file_size: MIB,
            max_file_size: 8 * MIB,
            clean_start: false,
            work_dir: "data".to_string(),
            bucket: "default".to_string(),
            scratch_dir: PathBuf::from("scratch"),
            upload_concurrency: 4,
            reclaim_timeout_secs: 600,
            state_file: PathBuf::from("integrity.json"),
            log_file: PathBuf::from("checker.log"),
        }
    }
}

/// Inclusive bounds on the size of each generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub min: u64,
    pub max: u64,
}

fn invalid(message: impl Into<String>) -> AuditError {
    AuditError::new(ErrorCode::ConfigInvalid, message)
}

impl AgentConfig {
    /// Reads and validates `path`. A missing or empty file yields the
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, AuditError> {
        let cfg = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml_str(&raw)
                .map_err(|e| e.context(&format!("failed to parse {}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(invalid(format!(
                    "failed to read config at {}: {e}",
                    path.display()
                )))
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, AuditError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.bus_address.trim().is_empty() {
            return Err(invalid("busAddress must not be empty"));
        }
        if self.worker_address.trim().is_empty() {
            return Err(invalid("workerAddress must not be empty"));
        }
        if self.check_interval_secs == 0 {
            return Err(invalid("checkIntervalSecs must be > 0"));
        }
        for (name, pct) in [
            ("downloadSamplePct", self.download_sample_pct),
            ("deleteSamplePct", self.delete_sample_pct),
        ] {
            if !(pct > 0.0 && pct <= 100.0) {
                return Err(invalid(format!("{name} must be in (0, 100], got {pct}")));
            }
        }
        if self.dataset_size == 0 {
            return Err(invalid("datasetSize must be > 0"));
        }
        if self.min_file_size == 0 || self.min_file_size > self.max_file_size {
            return Err(invalid(format!(
                "file size bounds must satisfy 0 < minFileSize <= maxFileSize, got [{}, {}]",
                self.min_file_size, self.max_file_size
            )));
        }
        if self.upload_concurrency == 0 {
            return Err(invalid("uploadConcurrency must be >= 1"));
        }
        if self.reclaim_timeout_secs == 0 {
            return Err(invalid("reclaimTimeoutSecs must be > 0"));
        }
        if self.work_dir.trim_matches('/').is_empty() {
            return Err(invalid("workDir must name a namespace"));
        }
        if self.bucket.trim().is_empty() {
            return Err(invalid("bucket must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub fn reclaim_timeout(&self) -> Duration {
        Duration::from_secs(self.reclaim_timeout_secs)
    }

    #[must_use]
    pub fn size_bounds(&self) -> SizeBounds {
        SizeBounds {
            min: self.min_file_size,
            max: self.max_file_size,
        }
    }

    #[must_use]
    pub fn download_sample_size(&self) -> u64 {
        pct_of(self.dataset_size, self.download_sample_pct)
    }

    #[must_use]
    pub fn delete_sample_size(&self) -> u64 {
        pct_of(self.dataset_size, self.delete_sample_pct)
    }

    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        (!self.log_file.as_os_str().is_empty()).then_some(self.log_file.as_path())
    }

    #[must_use]
    pub fn endpoints(&self) -> RenterdEndpoints {
        RenterdEndpoints {
            bus: self.bus_address.clone(),
            bus_password: self.bus_password.clone(),
            worker: self.worker_address.clone(),
            worker_password: self.worker_password.clone(),
        }
    }
}

fn pct_of(total: u64, pct: f64) -> u64 {
    (total as f64 * pct / 100.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AgentConfig::default();
        cfg.validate().expect("defaults");
        assert_eq!(cfg.download_sample_size(), 10 * GIB / 100);
        assert_eq!(cfg.log_file(), Some(Path::new("checker.log")));
    }

    #[test]
    fn yaml_uses_camel_case_and_fills_defaults() {
        let cfg = AgentConfig::from_yaml_str(
            "busAddress: http://bus:9980/api/bus\ndatasetSize: 1048576\ndeleteSamplePct: 50\nlogFile: ''\n",
        )
        .expect("parse");
        assert_eq!(cfg.bus_address, "http://bus:9980/api/bus");
        assert_eq!(cfg.dataset_size, MIB);
        assert_eq!(cfg.delete_sample_size(), MIB / 2);
        assert_eq!(cfg.worker_password, "test");
        assert_eq!(cfg.log_file(), None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AgentConfig::from_yaml_str("integrityCheckCyclePct: 0.5\n").expect_err("unknown");
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(
            AgentConfig::from_yaml_str("  \n").expect("empty"),
            AgentConfig::default()
        );
    }

    #[test]
    fn validation_rejects_bad_bounds_and_percentages() {
        let mut cfg = AgentConfig {
            min_file_size: 10,
            max_file_size: 5,
            ..AgentConfig::default()
        };
        assert_eq!(cfg.validate().expect_err("bounds").code, ErrorCode::ConfigInvalid);
        cfg.max_file_size = 10;
        cfg.validate().expect("equal bounds are fine");
        cfg.download_sample_pct = 0.0;
        assert!(cfg.validate().is_err());
        cfg.download_sample_pct = 100.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tmp");
        let cfg = AgentConfig::load(&dir.path().join("absent.yml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }
}
