// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epoch-seconds helpers shared across the workspace.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as epoch seconds. All persisted timestamps in the store
/// (start_time, end_time, created_at) use this unit.
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Formats an epoch-seconds timestamp as `YYYYMMDD-HHMMSS`, the component
/// used in remote log-file names.
pub fn format_log_timestamp(epoch_secs: i64) -> String {
    let dt = chrono::DateTime::from_timestamp(epoch_secs, 0).unwrap_or_default();
    dt.format("%Y%m%d-%H%M%S").to_string()
}
