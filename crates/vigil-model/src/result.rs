// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use vigil_core::{AuditError, ErrorCode};

use crate::serde_helpers::{self, failure_text};

/// Tagged error attached to a cycle result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleFailure {
    pub kind: ErrorCode,
    pub message: String,
}

impl CycleFailure {
    #[must_use]
    pub fn new(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Parses the persisted `"<kind>: <message>"` form. Text without a known
    /// tag is kept whole under [`ErrorCode::Internal`].
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if let Some((tag, message)) = text.split_once(": ") {
            if let Some(kind) = ErrorCode::parse(tag) {
                return Self::new(kind, message);
            }
        }
        Self::new(ErrorCode::Internal, text)
    }

    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.kind.is_critical()
    }
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<AuditError> for CycleFailure {
    fn from(err: AuditError) -> Self {
        Self::new(err.code, err.message)
    }
}

impl From<&AuditError> for CycleFailure {
    fn from(err: &AuditError) -> Self {
        Self::new(err.code, err.message.clone())
    }
}

/// Snapshot of one audit cycle. Byte counts are pre-rendered with
/// [`vigil_core::human_readable_size`]; empty strings mean "nothing moved".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResult {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub downloaded: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uploaded: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub removed: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pruned: String,

    #[serde(
        rename = "downloadSpeedMBPS",
        default,
        skip_serializing_if = "serde_helpers::is_zero_f64"
    )]
    pub download_speed_mbps: f64,
    #[serde(
        rename = "uploadSpeedMBPS",
        default,
        skip_serializing_if = "serde_helpers::is_zero_f64"
    )]
    pub upload_speed_mbps: f64,
    /// Nanoseconds spent deleting and reclaiming.
    #[serde(
        rename = "pruneElapsedTime",
        default,
        skip_serializing_if = "serde_helpers::is_zero_u64"
    )]
    pub prune_elapsed_nanos: u64,

    pub dataset_complete: bool,
    #[serde(
        default,
        with = "failure_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<CycleFailure>,
}

impl CycleResult {
    #[must_use]
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            ended_at: at,
            downloaded: String::new(),
            uploaded: String::new(),
            removed: String::new(),
            pruned: String::new(),
            download_speed_mbps: 0.0,
            upload_speed_mbps: 0.0,
            prune_elapsed_nanos: 0,
            dataset_complete: false,
            error: None,
        }
    }

    pub fn set_prune_elapsed(&mut self, elapsed: Duration) {
        self.prune_elapsed_nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
    }

    #[must_use]
    pub fn prune_elapsed(&self) -> Duration {
        Duration::from_nanos(self.prune_elapsed_nanos)
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_parse_recovers_known_tag() {
        let failure = CycleFailure::parse("timeout: failed to list objects; deadline of 60s exceeded");
        assert_eq!(failure.kind, ErrorCode::Timeout);
        assert_eq!(failure.message, "failed to list objects; deadline of 60s exceeded");
    }

    #[test]
    fn failure_parse_falls_back_to_internal() {
        let failure = CycleFailure::parse("failed to upload file: connection reset");
        assert_eq!(failure.kind, ErrorCode::Internal);
        assert_eq!(failure.message, "failed to upload file: connection reset");
    }

    #[test]
    fn failure_display_matches_audit_error() {
        let err = AuditError::integrity_mismatch("data/ab.data", "ab", "cd");
        assert_eq!(CycleFailure::from(&err).to_string(), err.to_string());
        assert!(CycleFailure::from(err).is_critical());
    }
}
