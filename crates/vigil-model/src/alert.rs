// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::CycleResult;

pub const ALERT_SOURCE: &str = "vigil";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    Info,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub data: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// The per-cycle alert: critical when the cycle found corrupted data,
    /// informational otherwise.
    pub fn for_cycle(result: &CycleResult) -> Result<Self, serde_json::Error> {
        let (severity, message) = match &result.error {
            Some(failure) if failure.is_critical() => {
                (Severity::Critical, format!("integrity check failed: {failure}"))
            }
            Some(failure) => (Severity::Info, format!("integrity cycle failed: {failure}")),
            None => (Severity::Info, "integrity cycle succeeded".to_string()),
        };
        let mut data = BTreeMap::new();
        data.insert(
            "source".to_string(),
            serde_json::Value::String(ALERT_SOURCE.to_string()),
        );
        data.insert("result".to_string(), serde_json::to_value(result)?);
        if let Some(failure) = &result.error {
            data.insert(
                "error".to_string(),
                serde_json::json!({ "kind": failure.kind, "message": failure.message }),
            );
        }
        Ok(Self {
            id: random_id(),
            severity,
            message,
            data,
            timestamp: result.ended_at,
        })
    }
}

/// 256 random bits, hex-encoded.
#[must_use]
pub fn random_id() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CycleFailure;
    use vigil_core::ErrorCode;

    #[test]
    fn successful_cycle_is_info() {
        let result = CycleResult::started(Utc::now());
        let alert = Alert::for_cycle(&result).expect("alert");
        assert_eq!(alert.severity, Severity::Info);
        assert_eq!(alert.data["source"], ALERT_SOURCE);
        assert!(!alert.data.contains_key("error"));
        assert_eq!(alert.id.len(), 64);
    }

    #[test]
    fn mismatch_is_critical_with_structured_error() {
        let mut result = CycleResult::started(Utc::now());
        result.error = Some(CycleFailure::new(ErrorCode::IntegrityMismatch, "bad bytes"));
        let alert = Alert::for_cycle(&result).expect("alert");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.data["error"]["kind"], "integrity_mismatch");
        assert_eq!(alert.data["result"]["error"], "integrity_mismatch: bad bytes");
    }

    #[test]
    fn ids_differ() {
        assert_ne!(random_id(), random_id());
    }
}
