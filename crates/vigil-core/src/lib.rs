#![forbid(unsafe_code)]
//! Shared building blocks for the vigil auditing agent: the error taxonomy,
//! the size-scaled timeout policy, content digests and size formatting.

mod digest;
mod error;
mod timeout;
mod units;

pub use digest::{
    digest_reader, expected_digest_hex, ContentDigest, DigestHasher, DATA_EXTENSION,
    DEFAULT_CHUNK_SIZE, DIGEST_LEN,
};
pub use error::{AuditError, ErrorCode, ExitCode, StageFailure};
pub use timeout::{TimeoutPolicy, DEFAULT_DEADLINE_FLOOR, DEFAULT_SECONDS_PER_BYTE};
pub use units::{human_readable_size, throughput_mbps, GIB, KIB, MIB};

pub const CRATE_NAME: &str = "vigil-core";
