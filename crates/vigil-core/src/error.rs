// SPDX-License-Identifier: Apache-2.0

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Validation = 3,
    DependencyFailure = 4,
    Internal = 10,
}

impl ExitCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Usage => "usage",
            Self::Validation => "validation",
            Self::DependencyFailure => "dependency_failure",
            Self::Internal => "internal",
        }
    }
}

/// Stable error-kind tag. The string form is what lands in the state file
/// and in alert payloads, so existing tags must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    Timeout,
    IntegrityMismatch,
    StoreUnreachable,
    PartialFailure,
    LocalIo,
    NotFound,
    Store,
    ConfigInvalid,
    Internal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        Self::Timeout,
        Self::IntegrityMismatch,
        Self::StoreUnreachable,
        Self::PartialFailure,
        Self::LocalIo,
        Self::NotFound,
        Self::Store,
        Self::ConfigInvalid,
        Self::Internal,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::IntegrityMismatch => "integrity_mismatch",
            Self::StoreUnreachable => "store_unreachable",
            Self::PartialFailure => "partial_failure",
            Self::LocalIo => "local_io",
            Self::NotFound => "not_found",
            Self::Store => "store_error",
            Self::ConfigInvalid => "config_invalid",
            Self::Internal => "internal",
        }
    }

    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == tag)
    }

    /// Codes that indicate the stored data itself is wrong rather than the
    /// path to it being unhealthy.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::IntegrityMismatch)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Self::parse(&tag).ok_or_else(|| D::Error::custom(format!("unknown error code: {tag}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditError {
    pub code: ErrorCode,
    pub message: String,
}

impl AuditError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    #[must_use]
    pub fn local_io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::LocalIo, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    #[must_use]
    pub fn integrity_mismatch(key: &str, expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorCode::IntegrityMismatch,
            format!("hash mismatch for object '{key}', expected '{expected}', got '{actual}'"),
        )
    }

    /// Prefixes the message with stage context, keeping the code.
    #[must_use]
    pub fn context(self, what: &str) -> Self {
        Self {
            code: self.code,
            message: format!("{what}; {}", self.message),
        }
    }

    #[must_use]
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AuditError {}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::local_io(err.to_string())
    }
}

/// A stage that stopped part-way: `completed` holds what was done before the
/// first error, `error` is that error.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure<T> {
    pub completed: T,
    pub error: AuditError,
}

impl<T> StageFailure<T> {
    #[must_use]
    pub fn new(completed: T, error: AuditError) -> Self {
        Self { completed, error }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageFailure<U> {
        StageFailure {
            completed: f(self.completed),
            error: self.error,
        }
    }
}

impl<T: Default> From<AuditError> for StageFailure<T> {
    fn from(error: AuditError) -> Self {
        Self {
            completed: T::default(),
            error,
        }
    }
}

impl<T: fmt::Debug> fmt::Display for StageFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (completed before failure: {:?})", self.error, self.completed)
    }
}

impl<T: fmt::Debug> std::error::Error for StageFailure<T> {}
