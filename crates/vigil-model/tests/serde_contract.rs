// SPDX-License-Identifier: Apache-2.0

use chrono::{TimeZone, Utc};
use std::time::Duration;
use vigil_core::{human_readable_size, ErrorCode, MIB};
use vigil_model::{CycleFailure, CycleResult, IntegrityState};

fn sample_result() -> CycleResult {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("start");
    let mut result = CycleResult::started(start);
    result.ended_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).single().expect("end");
    result.uploaded = human_readable_size(24 * MIB);
    result.upload_speed_mbps = 12.5;
    result.set_prune_elapsed(Duration::from_millis(1500));
    result.dataset_complete = true;
    result
}

#[test]
fn result_uses_camel_case_and_omits_empty_fields() {
    let json = serde_json::to_value(sample_result()).expect("encode");
    assert_eq!(json["startedAt"], "2024-05-01T12:00:00Z");
    assert_eq!(json["uploaded"], "25165824 bytes (24.0 MiB)");
    assert_eq!(json["uploadSpeedMBPS"], 12.5);
    assert_eq!(json["pruneElapsedTime"], 1_500_000_000_u64);
    assert_eq!(json["datasetComplete"], true);
    for absent in ["downloaded", "removed", "pruned", "downloadSpeedMBPS", "error"] {
        assert!(json.get(absent).is_none(), "{absent} should be omitted");
    }
}

#[test]
fn error_is_persisted_as_plain_text() {
    let mut result = sample_result();
    result.error = Some(CycleFailure::new(
        ErrorCode::PartialFailure,
        "uploaded 3 of 5 files; timeout: deadline of 60s exceeded",
    ));
    let text = serde_json::to_string(&result).expect("encode");
    assert!(text.contains(
        r#""error":"partial_failure: uploaded 3 of 5 files; timeout: deadline of 60s exceeded""#
    ));
    let back: CycleResult = serde_json::from_str(&text).expect("decode");
    assert_eq!(back, result);
}

#[test]
fn empty_error_string_decodes_as_success() {
    let text = r#"{"startedAt":"2024-05-01T12:00:00Z","endedAt":"2024-05-01T12:00:01Z","datasetComplete":false,"error":""}"#;
    let result: CycleResult = serde_json::from_str(text).expect("decode");
    assert!(result.error.is_none());
}

#[test]
fn state_file_shape() {
    let mut state = IntegrityState::default();
    state.record(sample_result());
    let json = serde_json::to_value(&state).expect("encode");
    assert_eq!(json["ok"], true);
    assert_eq!(json["results"].as_array().map(Vec::len), Some(1));

    let empty: IntegrityState = serde_json::from_str(r#"{"ok":true}"#).expect("decode");
    assert!(empty.results.is_empty());
}
