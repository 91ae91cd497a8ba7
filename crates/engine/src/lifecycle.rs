// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle Coordinator: mediates every job state-machine transition and
//! the remote effects that go with it. Every operation reserves its store
//! row before touching the network, performs the remote side idempotently,
//! then updates state to match what actually happened — so a crash or a
//! connection failure midway through never leaves the store and the
//! remote host permanently disagreeing about which state a job is in.

use std::sync::Arc;

use rj_adapters::deploy_if_changed;
use rj_core::deferred::DeferredOpKind;
use rj_core::envelope::EnvelopeSpec;
use rj_core::id::JobId;
use rj_core::job::{Job, JobStatus};
use rj_core::queue_line::{AfterSpec, QueueLine};
use rj_core::time::now_epoch_secs;
use rj_core::{paths, quoting};
use rj_shell::{Deadline, RetryPolicy, Transport, TransportExt};
use rj_storage::JobStore;

use crate::error::EngineError;
use crate::queue_file;

/// Outcome of [`Coordinator::start_job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    pub job_id: JobId,
    /// Set when the remote launch hit a connection failure and the caller
    /// asked to queue-on-fail instead of failing outright.
    pub queued_on_failure: bool,
}

pub struct Coordinator {
    store: Arc<JobStore>,
    transport: Arc<dyn Transport>,
    /// Webhook URL for the deployed notification helper; `None` disables
    /// notifications entirely (the helper is never deployed).
    webhook_url: Option<String>,
    /// Applied to plain command-layer operations (mkdir, chmod); the
    /// synchronizer's quick path never goes through the coordinator, so
    /// it is unaffected.
    retry: RetryPolicy,
}

impl Coordinator {
    pub fn new(
        store: Arc<JobStore>,
        transport: Arc<dyn Transport>,
        webhook_url: Option<String>,
    ) -> Self {
        Self {
            store,
            transport,
            webhook_url,
            retry: RetryPolicy::DEFAULT,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn start_job(
        &self,
        host: &str,
        cwd: &str,
        cmd: &str,
        desc: Option<&str>,
        env: Vec<(String, String)>,
        timeout_secs: Option<u64>,
        queue_on_fail: bool,
    ) -> Result<StartOutcome, EngineError> {
        let now = now_epoch_secs();
        let job_id = self.store.record_starting(host, cwd, cmd, desc, now)?;

        let job = Job {
            id: job_id,
            host: host.to_string(),
            working_dir: cwd.to_string(),
            command: cmd.to_string(),
            description: desc.map(str::to_string),
            error_message: None,
            queue_name: String::new(),
            start_time: Some(now),
            end_time: None,
            exit_code: None,
            status: JobStatus::Starting,
            legacy_session_name: None,
        };

        match self.launch_remote(&job, now, env, timeout_secs).await {
            Ok(()) => {
                self.store
                    .transition(job_id, JobStatus::Starting, JobStatus::Running)?;
                Ok(StartOutcome {
                    job_id,
                    queued_on_failure: false,
                })
            }
            Err(err) if err.is_connection() && queue_on_fail => {
                self.store
                    .transition(job_id, JobStatus::Starting, JobStatus::Pending)?;
                Ok(StartOutcome {
                    job_id,
                    queued_on_failure: true,
                })
            }
            Err(err) => {
                self.store
                    .mark_failed(job_id, &err.to_string(), now_epoch_secs())?;
                Err(err)
            }
        }
    }

    async fn launch_remote(
        &self,
        job: &Job,
        start_time: i64,
        env: Vec<(String, String)>,
        timeout_secs: Option<u64>,
    ) -> Result<(), EngineError> {
        let paths = paths::job_paths(job);
        let session = job.session_name();

        self.ensure_remote_dir(&job.host, &paths::log_dir()).await?;

        // Defensive only: session names are id-derived and therefore
        // unique, so this should never be true. Logged, not fatal.
        if self
            .transport
            .check_session_exists(&job.host, &session, Deadline::SYNC_FULL)
            .await?
        {
            tracing::warn!(session, host = %job.host, "session already exists before launch");
        }

        let notify_helper = match &self.webhook_url {
            Some(_) => Some(self.ensure_notify_helper_deployed(&job.host).await?),
            None => None,
        };

        let envelope = EnvelopeSpec {
            job_id: job.id,
            working_dir: job.working_dir.clone(),
            command: job.command.clone(),
            paths: paths.clone(),
            start_time,
            host: job.host.clone(),
            description: job.description.clone(),
            notify_helper,
            timeout_secs,
            env,
        };

        self.transport
            .write_remote_file(
                &job.host,
                &paths.meta,
                &envelope.metadata().to_text(),
                Deadline::SYNC_FULL,
            )
            .await?;

        self.transport
            .spawn_session(
                &job.host,
                &session,
                &job.working_dir,
                &envelope.launch_command(),
                Deadline::SYNC_FULL,
            )
            .await?;

        Ok(())
    }

    pub async fn queue_job(
        &self,
        host: &str,
        cwd: &str,
        cmd: &str,
        desc: Option<&str>,
        queue: &str,
        env: Vec<(String, String)>,
        after_job: Option<JobId>,
        after_any: bool,
    ) -> Result<JobId, EngineError> {
        let job_id = self.store.record_queued(host, cwd, cmd, desc, queue)?;

        self.ensure_remote_dir(host, &paths::queue_dir()).await?;

        let after = match after_job {
            Some(id) if after_any => AfterSpec::Any(id),
            Some(id) => AfterSpec::Success(id),
            None => AfterSpec::None,
        };
        let line = QueueLine {
            job_id,
            working_dir: cwd.to_string(),
            command: cmd.to_string(),
            description: desc.unwrap_or_default().to_string(),
            env,
            after,
        };
        queue_file::append_line(self.transport.as_ref(), host, queue, &line).await?;

        Ok(job_id)
    }

    pub async fn kill_job(&self, id: JobId) -> Result<(), EngineError> {
        let job = self
            .store
            .get_job(id)?
            .ok_or(EngineError::JobNotFound(id))?;
        let session = job.session_name();

        match self
            .transport
            .kill_session(&job.host, &session, Deadline::SYNC_FULL)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_connection() => {
                self.store.add_deferred_operation(
                    &job.host,
                    DeferredOpKind::KillJob,
                    id,
                    None,
                    now_epoch_secs(),
                )?;
                if job.status == JobStatus::Queued && !job.queue_name.is_empty() {
                    self.store.add_deferred_operation(
                        &job.host,
                        DeferredOpKind::RemoveQueued,
                        id,
                        Some(&job.queue_name),
                        now_epoch_secs(),
                    )?;
                }
                return Ok(());
            }
            // A command-level failure here (e.g. "session not found") does
            // not stop us from recording the job as dead: that is the goal
            // state kill-job is trying to reach either way.
            Err(_) => {}
        }

        // A still-queued job also has a line waiting in the remote queue
        // file; leaving it there would let the runner launch a job the
        // store already recorded as dead.
        if job.status == JobStatus::Queued && !job.queue_name.is_empty() {
            match queue_file::remove_line(self.transport.as_ref(), &job.host, &job.queue_name, id)
                .await
            {
                Ok(()) => {}
                Err(err) if err.is_connection() => {
                    self.store.add_deferred_operation(
                        &job.host,
                        DeferredOpKind::RemoveQueued,
                        id,
                        Some(&job.queue_name),
                        now_epoch_secs(),
                    )?;
                }
                Err(err) => {
                    tracing::warn!(job_id = %id, error = %err, "failed to drop queue line for killed job");
                }
            }
        }

        self.store.mark_dead_by_id(id, now_epoch_secs())?;
        Ok(())
    }

    pub async fn restart_job(&self, id: JobId) -> Result<JobId, EngineError> {
        let old = self
            .store
            .get_job(id)?
            .ok_or(EngineError::JobNotFound(id))?;

        self.kill_job(id).await?;

        let (cwd, command) = self.richer_cwd_and_command(&old).await;

        let outcome = self
            .start_job(
                &old.host,
                &cwd,
                &command,
                old.description.as_deref(),
                Vec::new(),
                None,
                false,
            )
            .await?;
        Ok(outcome.job_id)
    }

    /// Restart prefers the remote metadata file's `display_dir`/
    /// `display_cmd` over the store's raw `(working_dir, command)` when the
    /// host is reachable and the file parses, since the metadata file
    /// already strips any `cd <dir> &&` prefix the original command used.
    async fn richer_cwd_and_command(&self, old: &Job) -> (String, String) {
        let paths = paths::job_paths(old);
        match self
            .transport
            .read_remote_file(&old.host, &paths.meta, Deadline::SYNC_FAST)
            .await
        {
            Ok(text) => match rj_core::envelope::Metadata::parse(&text) {
                Ok(meta) => (meta.display_dir, meta.display_cmd),
                Err(_) => (old.working_dir.clone(), old.command.clone()),
            },
            Err(_) => (old.working_dir.clone(), old.command.clone()),
        }
    }

    pub async fn describe(&self, id: JobId, desc: &str) -> Result<(), EngineError> {
        if self.store.set_description(id, desc)? {
            Ok(())
        } else {
            Err(EngineError::JobNotFound(id))
        }
    }

    pub async fn move_queued(&self, id: JobId, new_host: &str) -> Result<(), EngineError> {
        let job = self
            .store
            .get_job(id)?
            .ok_or(EngineError::JobNotFound(id))?;
        if job.status != JobStatus::Queued {
            return Err(EngineError::InvalidArgument(format!(
                "job {id} is not queued (status: {})",
                job.status
            )));
        }

        let old_host = job.host.clone();
        let queue_name = job.queue_name.clone();

        if !self.store.update_host(id, new_host)? {
            return Err(EngineError::JobNotFound(id));
        }

        match queue_file::remove_line(self.transport.as_ref(), &old_host, &queue_name, id).await {
            Ok(()) => {}
            Err(err) if err.is_connection() => {
                self.store.add_deferred_operation(
                    &old_host,
                    DeferredOpKind::RemoveQueued,
                    id,
                    Some(&queue_name),
                    now_epoch_secs(),
                )?;
            }
            Err(err) => return Err(err),
        }

        let line = QueueLine {
            job_id: id,
            working_dir: job.working_dir.clone(),
            command: job.command.clone(),
            description: job.description.clone().unwrap_or_default(),
            env: Vec::new(),
            after: AfterSpec::None,
        };
        match queue_file::append_line(self.transport.as_ref(), new_host, &queue_name, &line).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_connection() => {
                self.store.add_deferred_operation(
                    new_host,
                    DeferredOpKind::MoveFromQueue,
                    id,
                    Some(&queue_name),
                    now_epoch_secs(),
                )?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Ensures a queue runner session is active on `host` for `queue_name`,
    /// deploying the runner script first if it is missing or stale. A
    /// session that already exists is treated as already started.
    pub async fn ensure_queue_runner_started(
        &self,
        host: &str,
        queue_name: &str,
    ) -> Result<(), EngineError> {
        self.ensure_remote_dir(host, &paths::queue_dir()).await?;

        let script_path = paths::queue_runner_script_path();
        let script = rj_adapters::queue_runner_script();
        deploy_if_changed(self.transport.as_ref(), host, &script_path, &script).await?;
        self.chmod_executable(host, &script_path).await?;

        let session = quoting::queue_session_name(queue_name);
        if self
            .transport
            .check_session_exists(host, &session, Deadline::SYNC_FULL)
            .await?
        {
            return Ok(());
        }

        self.transport
            .spawn_session(
                host,
                &session,
                "~",
                &format!("bash {script_path} {queue_name}"),
                Deadline::SYNC_FULL,
            )
            .await?;
        Ok(())
    }

    async fn ensure_notify_helper_deployed(&self, host: &str) -> Result<String, EngineError> {
        let path = paths::notify_helper_path();
        if let Some(url) = &self.webhook_url {
            let script = rj_adapters::notify_helper_script(url);
            deploy_if_changed(self.transport.as_ref(), host, &path, &script).await?;
            self.chmod_executable(host, &path).await?;
        }
        Ok(path)
    }

    async fn chmod_executable(&self, host: &str, path: &str) -> Result<(), EngineError> {
        self.transport
            .run_with_retry(host, &format!("chmod +x {path}"), Deadline::SYNC_FULL, self.retry)
            .await?;
        Ok(())
    }

    async fn ensure_remote_dir(&self, host: &str, dir: &str) -> Result<(), EngineError> {
        self.transport
            .run_with_retry(host, &format!("mkdir -p {dir}"), Deadline::SYNC_FULL, self.retry)
            .await?;
        Ok(())
    }
}
