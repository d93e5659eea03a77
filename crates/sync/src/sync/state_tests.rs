// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;

#[test]
fn failed_status_carries_kind_and_message() {
    let status = OpStatus::failed(&Error::FetchInFlight);
    assert_eq!(status.error_kind(), Some(ErrorKind::FetchInFlight));
    assert!(matches!(status, OpStatus::Failed { ref message, .. } if message.contains("in flight")));
}

#[parameterized(
    idle = { OpStatus::Idle, None },
    in_flight = { OpStatus::InFlight, None },
    succeeded = { OpStatus::Succeeded { local: true }, None },
    failed = { OpStatus::failed(&Error::NotConnected), Some(ErrorKind::NotConnected) },
)]
fn error_kind_only_for_failures(status: OpStatus, expected: Option<ErrorKind>) {
    assert_eq!(status.error_kind(), expected);
}

#[test]
fn default_state_starts_on_first_page() {
    let state = SyncState::default();
    assert_eq!(state.page, 1);
    assert!(!state.ready);
    assert!(!state.is_busy());
}

#[test]
fn flushing_counts_as_busy() {
    let state = SyncState {
        flushing: true,
        ..SyncState::default()
    };
    assert!(state.is_busy());
}

#[test]
fn status_serializes_with_tag() {
    let json = serde_json::to_value(OpStatus::Succeeded { local: false }).unwrap_or_default();
    assert_eq!(json, serde_json::json!({"status": "succeeded", "local": false}));
}

#[test]
fn report_with_failures_is_not_clean() {
    let report = FlushReport {
        attempted: 2,
        succeeded: 1,
        failed: 1,
    };
    assert!(!report.is_clean());
    assert!(FlushReport::default().is_clean());
}
