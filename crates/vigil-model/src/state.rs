// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::CycleResult;

pub const MAX_RETAINED_RESULTS: usize = 30;

/// Rolling window of cycle results, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityState {
    pub ok: bool,
    #[serde(default)]
    pub results: Vec<CycleResult>,
}

impl Default for IntegrityState {
    fn default() -> Self {
        Self {
            ok: true,
            results: Vec::new(),
        }
    }
}

impl IntegrityState {
    /// Prepends `result`, drops anything past the retention window and
    /// recomputes the aggregate flag.
    pub fn record(&mut self, result: CycleResult) {
        self.results.insert(0, result);
        self.normalize();
    }

    pub fn normalize(&mut self) {
        self.results.truncate(MAX_RETAINED_RESULTS);
        self.ok = self.results.iter().all(CycleResult::is_ok);
    }

    #[must_use]
    pub fn latest(&self) -> Option<&CycleResult> {
        self.results.first()
    }

    /// Time since the latest cycle that completed balancing. `None` when
    /// there is no such cycle, which always makes a new one due.
    #[must_use]
    pub fn since_last_check(&self, now: DateTime<Utc>) -> Option<Duration> {
        let latest = self.latest().filter(|r| r.dataset_complete)?;
        Some((now - latest.started_at).to_std().unwrap_or(Duration::ZERO))
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.since_last_check(now) {
            None => true,
            Some(elapsed) => elapsed > interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CycleFailure;
    use chrono::TimeZone;
    use vigil_core::ErrorCode;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("ts")
    }

    fn completed(secs: i64) -> CycleResult {
        let mut r = CycleResult::started(at(secs));
        r.dataset_complete = true;
        r
    }

    #[test]
    fn empty_state_is_ok_and_due() {
        let state = IntegrityState::default();
        assert!(state.ok);
        assert!(state.is_due(at(0), Duration::from_secs(3600)));
    }

    #[test]
    fn incomplete_latest_is_always_due() {
        let mut state = IntegrityState::default();
        state.record(CycleResult::started(at(0)));
        assert!(state.is_due(at(1), Duration::from_secs(3600)));
    }

    #[test]
    fn completed_latest_gates_on_interval() {
        let mut state = IntegrityState::default();
        state.record(completed(0));
        assert!(!state.is_due(at(3600), Duration::from_secs(3600)));
        assert!(state.is_due(at(3601), Duration::from_secs(3600)));
    }

    #[test]
    fn ok_tracks_retained_window_only() {
        let mut state = IntegrityState::default();
        let mut failed = completed(0);
        failed.error = Some(CycleFailure::new(ErrorCode::Timeout, "slow"));
        state.record(failed);
        assert!(!state.ok);
        for i in 1..=MAX_RETAINED_RESULTS as i64 {
            state.record(completed(i));
        }
        assert_eq!(state.results.len(), MAX_RETAINED_RESULTS);
        assert!(state.ok, "failed result aged out of the window");
        assert_eq!(state.results[0].started_at, at(MAX_RETAINED_RESULTS as i64));
    }
}
