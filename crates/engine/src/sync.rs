// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronizer: reconciles DB-believed-`running` jobs with remote
//! reality, and drains deferred operations once a host responds again.
//!
//! Per-host work runs sequentially (the queue file is a single mutable
//! resource per host, and deferred operations must replay in creation
//! order); across hosts, [`Synchronizer::sync_all_hosts`] fans out with a
//! bounded worker pool since a single unreachable host shouldn't stall
//! reconciliation of every other host.

use std::sync::Arc;
use std::time::Duration;

use rj_adapters::{NoOpNotifier, Notifier};
use rj_core::deferred::{DeferredOpKind, DeferredOperation};
use rj_core::job::{Job, JobStatus};
use rj_core::time::now_epoch_secs;
use rj_core::{paths, quoting};
use rj_shell::{Deadline, Transport};
use rj_storage::{JobFilter, JobStore};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::EngineError;
use crate::queue_file;

/// How many hosts may be synced concurrently during a fleet-wide sync.
const DEFAULT_HOST_CONCURRENCY: usize = 8;

pub struct Synchronizer {
    store: Arc<JobStore>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    host_concurrency: usize,
}

impl Synchronizer {
    pub fn new(store: Arc<JobStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            notifier: Arc::new(NoOpNotifier),
            host_concurrency: DEFAULT_HOST_CONCURRENCY,
        }
    }

    /// Surfaces jobs that die without a trace. Normal completions are
    /// announced by the remote envelope's own notification hook; only a
    /// vanished session never reaches that step, so the synchronizer is
    /// the one place left that can report it.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Syncs every host with at least one active (running or queued) job
    /// or an undrained deferred operation. `full` selects the full-sync
    /// variant per host.
    pub async fn sync_all_hosts(&self, full: bool) -> Result<(), EngineError> {
        let hosts = self.store.list_hosts_needing_sync()?;
        let semaphore = Arc::new(Semaphore::new(self.host_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for host in hosts {
            let store = self.store.clone();
            let transport = self.transport.clone();
            let notifier = self.notifier.clone();
            let permit = semaphore.clone();
            tasks.spawn(async move {
                let _permit = permit.acquire_owned().await;
                let synchronizer = Synchronizer::new(store, transport).with_notifier(notifier);
                let result = if full {
                    synchronizer.full_sync_host(&host).await
                } else {
                    synchronizer.fast_sync_host(&host).await
                };
                (host, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((host, Err(err))) => {
                    tracing::warn!(host, error = %err, "host sync failed, will retry next cycle");
                }
                Ok((_, Ok(()))) => {}
                Err(join_err) => {
                    tracing::error!(error = %join_err, "host sync task panicked");
                }
            }
        }
        Ok(())
    }

    /// Fast-sync: checks `running` jobs' sessions with the non-retrying
    /// quick path, then drains this host's deferred operations.
    pub async fn fast_sync_host(&self, host: &str) -> Result<(), EngineError> {
        self.reconcile_running(host).await?;
        self.drain_deferred(host).await
    }

    /// Full-sync: additionally walks `queued` jobs (to catch transitions
    /// the queue runner already made) and re-verifies jobs that were
    /// recently marked `dead` while queued, in case a transient
    /// unreachable host caused a fast sync to misclassify them.
    pub async fn full_sync_host(&self, host: &str) -> Result<(), EngineError> {
        self.reconcile_running(host).await?;
        self.reconcile_queued(host).await?;
        self.reconcile_recently_dead(host).await?;
        self.drain_deferred(host).await
    }

    async fn reconcile_running(&self, host: &str) -> Result<(), EngineError> {
        let filter = JobFilter {
            status: Some(JobStatus::Running),
            host: Some(host.to_string()),
        };
        for job in self.store.list_jobs(&filter, 10_000)? {
            let session = job.session_name();
            let exists = self
                .transport
                .check_session_exists(host, &session, Deadline::SYNC_FAST)
                .await?;
            if !exists {
                self.reconcile_missing_session(host, &job).await?;
            }
        }
        Ok(())
    }

    /// A `queued` job with no remote session yet is normal (the queue
    /// runner hasn't reached it). One whose session now exists, or whose
    /// status file already shows a result, means the runner dispatched it
    /// without the coordinator's direct involvement; reconcile the same
    /// way a vanished `running` session does.
    async fn reconcile_queued(&self, host: &str) -> Result<(), EngineError> {
        let filter = JobFilter {
            status: Some(JobStatus::Queued),
            host: Some(host.to_string()),
        };
        for job in self.store.list_jobs(&filter, 10_000)? {
            let session = job.session_name();
            let exists = self
                .transport
                .check_session_exists(host, &session, Deadline::SYNC_FAST)
                .await?;
            if exists {
                self.store
                    .transition(job.id, JobStatus::Queued, JobStatus::Running)?;
                continue;
            }
            if let Some(text) = self.read_status_text(host, &job).await {
                self.apply_status_text(job.id, &text)?;
            }
        }
        Ok(())
    }

    /// Queue-runner jobs re-verified within this window after being marked
    /// dead; anything older stays dead.
    const RECENT_DEAD_WINDOW_SECS: i64 = 3600;

    /// A job the fast sync declared dead during a transient outage may in
    /// fact still be running (its session is alive) or have finished (its
    /// status file exists). Only queue-runner jobs qualify: a directly
    /// started job's session was checked while the host was reachable, so
    /// its classification stands.
    async fn reconcile_recently_dead(&self, host: &str) -> Result<(), EngineError> {
        let filter = JobFilter {
            status: Some(JobStatus::Dead),
            host: Some(host.to_string()),
        };
        let cutoff = now_epoch_secs() - Self::RECENT_DEAD_WINDOW_SECS;
        for job in self.store.list_jobs(&filter, 10_000)? {
            if job.queue_name.is_empty() {
                continue;
            }
            match job.end_time {
                Some(end) if end >= cutoff => {}
                _ => continue,
            }
            let session = job.session_name();
            if self
                .transport
                .check_session_exists(host, &session, Deadline::SYNC_FAST)
                .await?
            {
                self.store.revive_dead(job.id)?;
                tracing::info!(job_id = %job.id, host, "revived dead job: session is alive");
                continue;
            }
            if let Some(text) = self.read_status_text(host, &job).await {
                if let Ok(code) = text.trim().parse::<i32>() {
                    if self.store.revive_dead(job.id)? {
                        self.store
                            .record_completion_by_id(job.id, code, now_epoch_secs())?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn reconcile_missing_session(&self, host: &str, job: &Job) -> Result<(), EngineError> {
        match self.read_status_text(host, job).await {
            Some(text) => self.apply_status_text(job.id, &text),
            None => {
                if self.store.mark_dead_by_id(job.id, now_epoch_secs())? {
                    self.notify_dead(job).await;
                }
                Ok(())
            }
        }
    }

    async fn notify_dead(&self, job: &Job) {
        let label = job
            .description
            .clone()
            .unwrap_or_else(|| format!("job-{}", job.id));
        let meta = paths::job_paths(job).meta;
        if let Err(err) = self.notifier.notify(&label, -1, &job.host, &meta).await {
            tracing::warn!(job_id = %job.id, error = %err, "dead-job notification failed");
        }
    }

    /// Reads a job's status file, trying the locally computed path first
    /// and falling back to the id-keyed glob for artifacts a queue runner
    /// stamped with its own launch time. Legacy jobs have exactly one
    /// possible path, so no fallback applies.
    async fn read_status_text(&self, host: &str, job: &Job) -> Option<String> {
        let paths = paths::job_paths(job);
        if let Ok(text) = self
            .transport
            .read_remote_file(host, &paths.status, Deadline::SYNC_FAST)
            .await
        {
            return Some(text);
        }
        if job.is_legacy() {
            return None;
        }
        self.transport
            .read_remote_file(host, &paths::status_file_glob(job.id), Deadline::SYNC_FAST)
            .await
            .ok()
    }

    fn apply_status_text(&self, job_id: rj_core::id::JobId, text: &str) -> Result<(), EngineError> {
        match text.trim().parse::<i32>() {
            Ok(code) => {
                self.store
                    .record_completion_by_id(job_id, code, now_epoch_secs())?;
            }
            Err(_) => {
                self.store.mark_dead_by_id(job_id, now_epoch_secs())?;
            }
        }
        Ok(())
    }

    /// Replays deferred operations for `host` in creation order. A
    /// connection failure aborts the drain so the remainder rolls over to
    /// the next sync cycle; any other outcome deletes the operation.
    async fn drain_deferred(&self, host: &str) -> Result<(), EngineError> {
        for op in self.store.get_deferred_operations(host)? {
            let result = match op.kind {
                DeferredOpKind::KillJob => self.replay_kill_job(&op).await,
                DeferredOpKind::RemoveQueued => self.replay_remove_queued(&op).await,
                DeferredOpKind::MoveFromQueue => self.replay_move_from_queue(&op).await,
            };
            match result {
                Ok(()) => {
                    self.store.delete_deferred_operation(op.id)?;
                }
                Err(err) if err.is_connection() => return Ok(()),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn replay_kill_job(&self, op: &DeferredOperation) -> Result<(), EngineError> {
        let session = quoting::job_session_name(op.target_job_id.get());
        match self
            .transport
            .kill_session(&op.host, &session, Deadline::SYNC_FULL)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_connection() => return Err(EngineError::Transport(err)),
            Err(_) => {}
        }
        self.store.mark_dead_by_id(op.target_job_id, now_epoch_secs())?;
        Ok(())
    }

    async fn replay_remove_queued(&self, op: &DeferredOperation) -> Result<(), EngineError> {
        let queue_name = op.queue_name.as_deref().unwrap_or("default");
        queue_file::remove_line(self.transport.as_ref(), &op.host, queue_name, op.target_job_id)
            .await
    }

    async fn replay_move_from_queue(&self, op: &DeferredOperation) -> Result<(), EngineError> {
        let queue_name = op.queue_name.as_deref().unwrap_or("default");
        let job = self.store.get_job(op.target_job_id)?;
        let Some(job) = job else {
            return Ok(());
        };
        let line = rj_core::queue_line::QueueLine {
            job_id: op.target_job_id,
            working_dir: job.working_dir,
            command: job.command,
            description: job.description.unwrap_or_default(),
            env: Vec::new(),
            after: rj_core::queue_line::AfterSpec::None,
        };
        queue_file::append_line(self.transport.as_ref(), &op.host, queue_name, &line).await
    }
}

/// Parses a duration string like `"30s"`, `"5m"`, `"1h"` for watch-mode
/// deadlines and config intervals.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));
    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {s}"))?;
    let multiplier = match suffix.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        other => return Err(format!("unknown duration suffix: {other}")),
    };
    Ok(Duration::from_secs(num * multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rj_core::id::JobId;
    use rj_shell::FakeTransport;

    fn synchronizer(transport: FakeTransport) -> (Synchronizer, Arc<JobStore>) {
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let synchronizer = Synchronizer::new(store.clone(), Arc::new(transport));
        (synchronizer, store)
    }

    #[tokio::test]
    async fn running_job_with_live_session_is_left_alone() {
        let transport = FakeTransport::new();
        transport.seed_session("h1", "rj-1");
        let (sync, store) = synchronizer(transport);
        let job_id = store
            .record_starting("h1", "~/work", "make", None, 1)
            .unwrap();
        store
            .transition(job_id, JobStatus::Starting, JobStatus::Running)
            .unwrap();

        sync.fast_sync_host("h1").await.unwrap();

        let job = store.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn vanished_session_with_status_file_records_completion() {
        let transport = FakeTransport::new();
        let (sync, store) = synchronizer(transport.clone());
        let job_id = store
            .record_starting("h1", "~/work", "make", None, 1)
            .unwrap();
        store
            .transition(job_id, JobStatus::Starting, JobStatus::Running)
            .unwrap();
        let job = store.get_job(job_id).unwrap().unwrap();
        let paths = paths::job_paths(&job);
        transport.seed_file("h1", &paths.status, "0");

        sync.fast_sync_host("h1").await.unwrap();

        let job = store.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.exit_code, Some(0));
    }

    #[tokio::test]
    async fn vanished_session_without_status_file_is_marked_dead() {
        let transport = FakeTransport::new();
        let (sync, store) = synchronizer(transport);
        let job_id = store
            .record_starting("h1", "~/work", "make", None, 1)
            .unwrap();
        store
            .transition(job_id, JobStatus::Starting, JobStatus::Running)
            .unwrap();

        sync.fast_sync_host("h1").await.unwrap();

        let job = store.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Dead);
    }

    #[tokio::test]
    async fn dead_without_trace_fires_a_notification_exactly_once() {
        let transport = FakeTransport::new();
        let notifier = rj_adapters::FakeNotifier::new();
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let sync = Synchronizer::new(store.clone(), Arc::new(transport))
            .with_notifier(Arc::new(notifier.clone()));
        let job_id = store
            .record_starting("h1", "~/work", "make", Some("nightly build"), 1)
            .unwrap();
        store
            .transition(job_id, JobStatus::Starting, JobStatus::Running)
            .unwrap();

        sync.fast_sync_host("h1").await.unwrap();
        // A second pass finds the job already dead and stays quiet.
        sync.fast_sync_host("h1").await.unwrap();

        let calls = notifier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].job_label, "nightly build");
        assert_eq!(calls[0].exit_code, -1);
        assert_eq!(calls[0].host, "h1");
    }

    #[tokio::test]
    async fn drain_deferred_replays_kill_and_deletes_entry() {
        let transport = FakeTransport::new();
        transport.seed_session("h1", "rj-1");
        let (sync, store) = synchronizer(transport.clone());
        let job_id = JobId::new(1);
        store
            .add_deferred_operation("h1", DeferredOpKind::KillJob, job_id, None, 1)
            .unwrap();

        sync.drain_deferred("h1").await.unwrap();

        assert!(store.get_deferred_operations("h1").unwrap().is_empty());
        assert!(!transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, rj_shell::FakeCall::KillSession { .. }))
            .collect::<Vec<_>>()
            .is_empty());
    }

    #[tokio::test]
    async fn drain_deferred_aborts_on_connection_failure_leaving_entry() {
        let transport = FakeTransport::new();
        transport.mark_unreachable("h1");
        let (sync, store) = synchronizer(transport);
        let job_id = JobId::new(1);
        store
            .add_deferred_operation("h1", DeferredOpKind::KillJob, job_id, None, 1)
            .unwrap();

        sync.drain_deferred("h1").await.unwrap();

        assert_eq!(store.get_deferred_operations("h1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn full_sync_revives_a_dead_queue_job_whose_session_is_alive() {
        let transport = FakeTransport::new();
        let (sync, store) = synchronizer(transport.clone());
        let job_id = store
            .record_queued("h1", "~/work", "make", None, "nightly")
            .unwrap();
        store.mark_dead_by_id(job_id, now_epoch_secs()).unwrap();
        transport.seed_session("h1", &format!("rj-{job_id}"));

        sync.full_sync_host("h1").await.unwrap();

        let job = store.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.end_time.is_none());
        assert!(job.start_time.is_some());
    }

    #[tokio::test]
    async fn full_sync_completes_a_dead_queue_job_via_the_status_glob() {
        let transport = FakeTransport::new();
        let (sync, store) = synchronizer(transport.clone());
        let job_id = store
            .record_queued("h1", "~/work", "make", None, "nightly")
            .unwrap();
        store.mark_dead_by_id(job_id, now_epoch_secs()).unwrap();
        // The runner stamped the status file with its own launch time; the
        // local side only finds it through the id-keyed glob.
        transport.seed_file("h1", &paths::status_file_glob(job_id), "0");

        sync.full_sync_host("h1").await.unwrap();

        let job = store.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.exit_code, Some(0));
    }

    #[tokio::test]
    async fn full_sync_leaves_an_old_dead_queue_job_alone() {
        let transport = FakeTransport::new();
        let (sync, store) = synchronizer(transport.clone());
        let job_id = store
            .record_queued("h1", "~/work", "make", None, "nightly")
            .unwrap();
        store
            .mark_dead_by_id(job_id, now_epoch_secs() - 7 * 24 * 3600)
            .unwrap();
        transport.seed_session("h1", &format!("rj-{job_id}"));

        sync.full_sync_host("h1").await.unwrap();

        assert_eq!(
            store.get_job(job_id).unwrap().unwrap().status,
            JobStatus::Dead
        );
    }

    #[test]
    fn parse_duration_understands_suffixes() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert!(parse_duration("nope").is_err());
    }
}
