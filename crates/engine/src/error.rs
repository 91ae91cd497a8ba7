// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds for the coordinator, synchronizer, and plan scheduler.

use rj_adapters::DeployError;
use rj_core::error::TransportFailure;
use rj_core::id::JobId;
use rj_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportFailure),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    /// True when the underlying cause is a transport connection failure,
    /// whichever wrapper it arrived in. Policy code (queue-on-fail,
    /// deferred operations) keys off this rather than matching variants.
    pub fn is_connection(&self) -> bool {
        match self {
            EngineError::Transport(t) => t.is_connection(),
            EngineError::Deploy(DeployError::Transport { source, .. }) => source.is_connection(),
            _ => false,
        }
    }
}

impl From<EngineError> for rj_core::RjError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::JobNotFound(id) => rj_core::RjError::JobNotFound(id),
            EngineError::Transport(t) => rj_core::RjError::Transport(t),
            other => rj_core::RjError::Store(other.to_string()),
        }
    }
}
