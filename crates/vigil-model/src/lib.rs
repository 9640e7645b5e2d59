#![forbid(unsafe_code)]
//! Data model shared by the store adapters and the agent: listing entries,
//! redundancy and prunable-space reports, cycle results, the persisted
//! rolling state and alerts.

mod alert;
mod entry;
mod result;
mod serde_helpers;
mod state;

pub use alert::{random_id, Alert, Severity, ALERT_SOURCE};
pub use entry::{total_size, ObjectEntry, PrunableContract, ReclaimOutcome, RedundancySettings};
pub use result::{CycleFailure, CycleResult};
pub use state::{IntegrityState, MAX_RETAINED_RESULTS};

pub const CRATE_NAME: &str = "vigil-model";
