// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred operations.
//!
//! Created by the lifecycle coordinator when a host is unreachable at the
//! time of an operation; consumed by the synchronizer when the host next
//! responds. Ordered by creation time within a host.

use serde::{Deserialize, Serialize};

use crate::id::JobId;

crate::define_int_id! {
    /// Unique identifier for a deferred operation row.
    pub struct DeferredOperationId;
}

/// Kind of intent persisted for later replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferredOpKind {
    KillJob,
    RemoveQueued,
    MoveFromQueue,
}

impl DeferredOpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeferredOpKind::KillJob => "kill-job",
            DeferredOpKind::RemoveQueued => "remove-queued",
            DeferredOpKind::MoveFromQueue => "move-from-queue",
        }
    }
}

impl std::str::FromStr for DeferredOpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kill-job" => Ok(DeferredOpKind::KillJob),
            "remove-queued" => Ok(DeferredOpKind::RemoveQueued),
            "move-from-queue" => Ok(DeferredOpKind::MoveFromQueue),
            other => Err(format!("unknown deferred operation kind: {other}")),
        }
    }
}

/// A deferred operation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredOperation {
    pub id: DeferredOperationId,
    pub host: String,
    pub kind: DeferredOpKind,
    pub target_job_id: JobId,
    pub queue_name: Option<String>,
    pub created_at: i64,
}
