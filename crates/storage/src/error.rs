// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("job {0} not found")]
    JobNotFound(i64),

    #[error("deferred operation {0} not found")]
    DeferredOperationNotFound(i64),

    #[error("invalid status value in row: {0}")]
    InvalidStatus(String),

    #[error("invalid deferred operation kind in row: {0}")]
    InvalidDeferredKind(String),
}

impl From<StoreError> for rj_core::RjError {
    fn from(err: StoreError) -> Self {
        rj_core::RjError::Store(err.to_string())
    }
}
