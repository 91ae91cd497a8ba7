// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy: the kinds every layer above the
//! transport converges on when reporting failures to callers.

use thiserror::Error;

use crate::id::JobId;

/// Errors common to the lifecycle coordinator, synchronizer, and plan
/// scheduler. Transport-level connection/command errors are classified in
/// `rj-shell` and converted into [`RjError::Transport`] at the boundary
/// where policy decisions (retry, queue-on-fail, defer) are made.
#[derive(Debug, Error)]
pub enum RjError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("deferred operation {0} not found")]
    DeferredOperationNotFound(i64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportFailure),

    #[error("store error: {0}")]
    Store(String),
}

/// Connection vs. command classification for transport-level failures. This type is
/// re-exported here (rather than only living in `rj-shell`) so that
/// `rj-core::error` can express `RjError::Transport` without introducing a
/// dependency from `rj-core` on `rj-shell`; `rj-shell::TransportError`
/// converts into this at its API boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// Connection refused, timed out, DNS failure, unreachable host,
    /// authentication refusal, broken pipe. Retryable; upstream code makes
    /// policy decisions (queue-on-fail, defer operation) based on this kind.
    #[error("connection failure: {0}")]
    Connection(String),

    /// Non-zero exit with no connection-error signature. Not retried.
    #[error("command failure (exit {exit_code:?}): {stderr}")]
    Command { exit_code: Option<i32>, stderr: String },
}

impl TransportFailure {
    pub fn is_connection(&self) -> bool {
        matches!(self, TransportFailure::Connection(_))
    }
}
