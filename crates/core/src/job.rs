// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and the status state machine.

use serde::{Deserialize, Serialize};

use crate::id::JobId;

/// Status of a job. Terminal states are `Completed`, `Dead`, `Failed`;
/// `Pending` and `Queued` are waiting states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    Running,
    Queued,
    Pending,
    Completed,
    Dead,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Running => "running",
            JobStatus::Queued => "queued",
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Dead => "dead",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Dead | JobStatus::Failed
        )
    }

    /// True for the edges that correspond to the documented transitions
    /// table. This is deliberately narrow: callers invoke it to validate
    /// the `from` half of a conditional update before performing it, not as
    /// a general-purpose graph walker.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Starting, Running)
                | (Starting, Failed)
                | (Starting, Pending)
                | (Pending, Starting)
                | (Queued, Running)
                | (Running, Completed)
                | (Running, Dead) // includes explicit kill
                | (Queued, Dead) // explicit kill of a still-queued job
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(JobStatus::Starting),
            "running" => Ok(JobStatus::Running),
            "queued" => Ok(JobStatus::Queued),
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            "dead" => Ok(JobStatus::Dead),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub host: String,
    pub working_dir: String,
    pub command: String,
    pub description: Option<String>,
    pub error_message: Option<String>,
    /// Empty for non-queued jobs.
    pub queue_name: String,
    /// Nullable for unstarted queued jobs.
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub exit_code: Option<i32>,
    pub status: JobStatus,
    /// Non-empty only for records predating the ID-based naming scheme;
    /// readers must consult legacy file paths for such a job (see
    /// `rj_core::paths`).
    pub legacy_session_name: Option<String>,
}

impl Job {
    /// Tmux session name derived from job id (`rj-{job_id}`).
    pub fn session_name(&self) -> String {
        format!("rj-{}", self.id)
    }

    /// A legacy record is one created before job records were keyed by id;
    /// its remote artifacts live under `/tmp/tmux-{session_name}.*` rather
    /// than the id-based `~/.cache/<product>/logs/{job_id}-...` layout.
    pub fn is_legacy(&self) -> bool {
        self.legacy_session_name
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }
}

#[cfg(feature = "test-support")]
impl Job {
    /// Builds a minimal job record for tests in other crates.
    pub fn test_fixture(id: JobId, status: JobStatus) -> Job {
        Job {
            id,
            host: "build1".into(),
            working_dir: "~/work".into(),
            command: "true".into(),
            description: None,
            error_message: None,
            queue_name: String::new(),
            start_time: Some(1_700_000_000),
            end_time: None,
            exit_code: None,
            status,
            legacy_session_name: None,
        }
    }
}
