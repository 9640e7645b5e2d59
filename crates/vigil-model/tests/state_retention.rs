// SPDX-License-Identifier: Apache-2.0

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use vigil_core::ErrorCode;
use vigil_model::{CycleFailure, CycleResult, IntegrityState, MAX_RETAINED_RESULTS};

fn result(seq: i64, failed: bool) -> CycleResult {
    let at = Utc.timestamp_opt(1_700_000_000 + seq, 0).single().expect("ts");
    let mut r = CycleResult::started(at);
    r.dataset_complete = true;
    if failed {
        r.error = Some(CycleFailure::new(ErrorCode::Store, "rejected"));
    }
    r
}

proptest! {
    #[test]
    fn window_is_bounded_newest_first_and_ok_matches(outcomes in prop::collection::vec(any::<bool>(), 0..80)) {
        let mut state = IntegrityState::default();
        for (i, failed) in outcomes.iter().enumerate() {
            state.record(result(i as i64, *failed));
        }
        prop_assert!(state.results.len() <= MAX_RETAINED_RESULTS);
        prop_assert_eq!(state.results.len(), outcomes.len().min(MAX_RETAINED_RESULTS));
        for pair in state.results.windows(2) {
            prop_assert!(pair[0].started_at > pair[1].started_at);
        }
        let retained_failures = outcomes.iter().rev().take(MAX_RETAINED_RESULTS).any(|f| *f);
        prop_assert_eq!(state.ok, !retained_failures);
    }
}
