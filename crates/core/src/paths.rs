// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote filesystem layout and the legacy-record fallback for jobs
//! created before the id-based path scheme existed.

use crate::job::Job;

/// Per-job remote artifact paths under `~/.cache/<product>/logs/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub log: String,
    pub status: String,
    pub meta: String,
    pub pid: String,
}

/// Remote queue control file paths under `~/.cache/<product>/queue/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
    pub queue: String,
    pub current: String,
    pub runner_pid: String,
    pub stop: String,
}

const PRODUCT: &str = "rj";

fn cache_root() -> String {
    format!("~/.cache/{PRODUCT}")
}

/// Paths for a job's remote artifacts. A legacy job (non-empty
/// `legacy_session_name`) reads/writes under the old
/// `/tmp/tmux-{session_name}.*` layout instead of the id-based one;
/// everything else uses the current scheme keyed on `(job_id, start_time)`.
pub fn job_paths(job: &Job) -> JobPaths {
    if let Some(name) = job.legacy_session_name.as_deref().filter(|_| job.is_legacy()) {
        return JobPaths {
            log: format!("/tmp/tmux-{name}.log"),
            status: format!("/tmp/tmux-{name}.status"),
            meta: format!("/tmp/tmux-{name}.meta"),
            pid: format!("/tmp/tmux-{name}.pid"),
        };
    }

    let stamp = job
        .start_time
        .map(crate::time::format_log_timestamp)
        .unwrap_or_else(|| "00000000-000000".to_string());
    let stem = format!("{}/logs/{}-{}", cache_root(), job.id, stamp);
    JobPaths {
        log: format!("{stem}.log"),
        status: format!("{stem}.status"),
        meta: format!("{stem}.meta"),
        pid: format!("{stem}.pid"),
    }
}

pub fn queue_paths(queue_name: &str) -> QueuePaths {
    let dir = format!("{}/queue", cache_root());
    QueuePaths {
        queue: format!("{dir}/{queue_name}.queue"),
        current: format!("{dir}/{queue_name}.current"),
        runner_pid: format!("{dir}/{queue_name}.runner.pid"),
        stop: format!("{dir}/{queue_name}.stop"),
    }
}

/// Glob over a job's possible status files. The exact stamped path is only
/// knowable locally for jobs the coordinator launched itself; a queue
/// runner stamps artifacts with its own launch time, so readers fall back
/// to this pattern. Transport paths are deliberately unquoted, so the
/// remote shell expands the glob.
pub fn status_file_glob(job_id: crate::id::JobId) -> String {
    format!("{}/logs/{job_id}-*.status", cache_root())
}

/// Same fallback as [`status_file_glob`], for the log file.
pub fn log_file_glob(job_id: crate::id::JobId) -> String {
    format!("{}/logs/{job_id}-*.log", cache_root())
}

pub fn queue_dir() -> String {
    format!("{}/queue", cache_root())
}

pub fn log_dir() -> String {
    format!("{}/logs", cache_root())
}

/// Path of the deployed runner script; one script per host, the queue name
/// is passed as its first argument when the runner session is spawned.
pub fn queue_runner_script_path() -> String {
    format!("{}/scripts/queue-runner.sh", cache_root())
}

pub fn notify_helper_path() -> String {
    format!("/tmp/{PRODUCT}-notify-slack.sh")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    fn job_with(legacy: Option<&str>, start: Option<i64>) -> Job {
        let mut job = crate::job::tests::test_job(crate::JobId::new(5), JobStatus::Running);
        job.legacy_session_name = legacy.map(str::to_string);
        job.start_time = start;
        job
    }

    #[test]
    fn id_based_job_uses_cache_layout() {
        let job = job_with(None, Some(1_704_164_645));
        let paths = job_paths(&job);
        assert_eq!(paths.log, "~/.cache/rj/logs/5-20240102-030405.log");
        assert_eq!(paths.status, "~/.cache/rj/logs/5-20240102-030405.status");
    }

    #[test]
    fn legacy_job_uses_tmp_tmux_layout() {
        let job = job_with(Some("old-session"), Some(1_704_164_645));
        let paths = job_paths(&job);
        assert_eq!(paths.log, "/tmp/tmux-old-session.log");
        assert_eq!(paths.meta, "/tmp/tmux-old-session.meta");
    }

    #[test]
    fn queue_paths_are_name_scoped() {
        let paths = queue_paths("default");
        assert_eq!(paths.queue, "~/.cache/rj/queue/default.queue");
        assert_eq!(paths.current, "~/.cache/rj/queue/default.current");
        assert_eq!(paths.stop, "~/.cache/rj/queue/default.stop");
    }

    #[test]
    fn deployed_script_paths_are_fixed() {
        assert_eq!(queue_runner_script_path(), "~/.cache/rj/scripts/queue-runner.sh");
        assert_eq!(notify_helper_path(), "/tmp/rj-notify-slack.sh");
    }
}
