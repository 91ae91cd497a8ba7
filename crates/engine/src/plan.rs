// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan Scheduler: decodes a multi-job plan file, validates it, dispatches
//! its entries against the coordinator, and (optionally) watches the
//! dispatched jobs to a terminal state.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Deserialize;

use rj_core::id::JobId;
use rj_core::job::{Job, JobStatus};
use rj_storage::JobStore;

use crate::error::EngineError;
use crate::lifecycle::Coordinator;
use crate::sync::Synchronizer;

/// A decoded plan file. `version` must be `1`; `kill` lists job ids to
/// terminate before dispatching any entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanFile {
    pub version: u32,
    #[serde(default)]
    pub kill: Vec<JobId>,
    pub entries: Vec<PlanEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntry {
    Job(JobEntry),
    Parallel(ParallelEntry),
    Series(SeriesEntry),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobEntry {
    pub name: Option<String>,
    pub host: String,
    pub dir: Option<String>,
    pub command: String,
    pub description: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub queue: Option<String>,
    #[serde(default)]
    pub queue_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParallelEntry {
    pub name: Option<String>,
    pub dir: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesEntry {
    pub name: Option<String>,
    pub dir: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub queue: Option<String>,
    #[serde(default)]
    pub wait: Wait,
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wait {
    Success,
    Any,
}

impl Default for Wait {
    fn default() -> Self {
        Wait::Success
    }
}

impl PlanFile {
    /// Decodes a plan from YAML text. Kept apart from the scheduling
    /// algorithm itself so the algorithm stays testable against hand-built
    /// `PlanFile` values.
    pub fn from_yaml_str(text: &str) -> Result<Self, EngineError> {
        serde_yaml::from_str(text).map_err(|e| EngineError::InvalidPlan(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.version != 1 {
            return Err(EngineError::InvalidPlan(format!(
                "unsupported plan version: {} (only 1 is supported)",
                self.version
            )));
        }
        for entry in &self.entries {
            if let PlanEntry::Series(series) = entry {
                let mut shared_host: Option<&str> = None;
                for job in &series.jobs {
                    match shared_host {
                        None => shared_host = Some(job.host.as_str()),
                        Some(host) if host != job.host => {
                            return Err(EngineError::InvalidPlan(format!(
                                "series {:?} mixes hosts {host} and {}",
                                series.name, job.host
                            )));
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }
}

/// Merges block-level and child-level env maps, child entries overriding
/// block entries on key collision. Returns a `Vec` (rather than a map) in
/// deterministic key order, matching the shape `EnvelopeSpec`/`QueueLine`
/// already carry env vars in.
fn merge_env(
    block: &HashMap<String, String>,
    child: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut merged: BTreeMap<&str, &str> = block.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    for (k, v) in child {
        merged.insert(k.as_str(), v.as_str());
    }
    merged
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn effective_dir<'a>(block: Option<&'a str>, child: Option<&'a str>) -> &'a str {
    child.or(block).unwrap_or("~")
}

/// Runs a validated plan: kills first, then dispatches every entry in
/// order. Returns the ids of every job scheduled (started or queued).
pub async fn run_plan(
    coordinator: &Coordinator,
    plan: &PlanFile,
    auto_start_queue_runner: bool,
) -> Result<Vec<JobId>, EngineError> {
    plan.validate()?;

    for id in &plan.kill {
        if let Err(err) = coordinator.kill_job(*id).await {
            tracing::warn!(job_id = %id, error = %err, "plan kill failed, continuing");
        }
    }

    let mut scheduled = Vec::new();
    let empty_env = HashMap::new();
    for entry in &plan.entries {
        match entry {
            PlanEntry::Job(job) => {
                scheduled.push(
                    schedule_job(coordinator, job, None, &empty_env, auto_start_queue_runner).await?,
                );
            }
            PlanEntry::Parallel(block) => {
                for job in &block.jobs {
                    scheduled.push(
                        schedule_job(
                            coordinator,
                            job,
                            block.dir.as_deref(),
                            &block.env,
                            auto_start_queue_runner,
                        )
                        .await?,
                    );
                }
            }
            PlanEntry::Series(block) => {
                scheduled.extend(schedule_series(coordinator, block, auto_start_queue_runner).await?);
            }
        }
    }
    Ok(scheduled)
}

async fn schedule_job(
    coordinator: &Coordinator,
    job: &JobEntry,
    block_dir: Option<&str>,
    block_env: &HashMap<String, String>,
    auto_start_queue_runner: bool,
) -> Result<JobId, EngineError> {
    let dir = effective_dir(block_dir, job.dir.as_deref());
    let env = merge_env(block_env, &job.env);

    if job.queue_only {
        let queue = job.queue.as_deref().unwrap_or("default");
        let id = coordinator
            .queue_job(
                &job.host,
                dir,
                &job.command,
                job.description.as_deref(),
                queue,
                env,
                None,
                false,
            )
            .await?;
        if auto_start_queue_runner {
            coordinator.ensure_queue_runner_started(&job.host, queue).await?;
        }
        Ok(id)
    } else {
        let outcome = coordinator
            .start_job(&job.host, dir, &job.command, job.description.as_deref(), env, None, false)
            .await?;
        Ok(outcome.job_id)
    }
}

async fn schedule_series(
    coordinator: &Coordinator,
    block: &SeriesEntry,
    auto_start_queue_runner: bool,
) -> Result<Vec<JobId>, EngineError> {
    let queue = block.queue.as_deref().unwrap_or("default");
    let mut ids = Vec::new();
    let mut prev: Option<JobId> = None;
    let mut host: Option<&str> = None;

    for job in &block.jobs {
        host = Some(job.host.as_str());
        let dir = effective_dir(block.dir.as_deref(), job.dir.as_deref());
        let env = merge_env(&block.env, &job.env);
        let (after_job, after_any) = match prev {
            None => (None, false),
            Some(id) => (Some(id), block.wait == Wait::Any),
        };
        let id = coordinator
            .queue_job(
                &job.host,
                dir,
                &job.command,
                job.description.as_deref(),
                queue,
                env,
                after_job,
                after_any,
            )
            .await?;
        ids.push(id);
        prev = Some(id);
    }

    if auto_start_queue_runner {
        if let Some(host) = host {
            coordinator.ensure_queue_runner_started(host, queue).await?;
        }
    }
    Ok(ids)
}

/// Per-job outcome reported by watch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobClassification {
    Succeeded,
    Failed,
    Queued,
    Running,
}

impl JobClassification {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobClassification::Succeeded | JobClassification::Failed)
    }
}

impl std::fmt::Display for JobClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            JobClassification::Succeeded => "succeeded",
            JobClassification::Failed => "failed",
            JobClassification::Queued => "queued",
            JobClassification::Running => "running",
        };
        write!(f, "{label}")
    }
}

/// Buckets a job into the four externally reported outcomes.
pub fn classify(job: &Job) -> JobClassification {
    match job.status {
        JobStatus::Completed if job.exit_code == Some(0) => JobClassification::Succeeded,
        JobStatus::Completed | JobStatus::Dead | JobStatus::Failed => JobClassification::Failed,
        // Starting/Pending are pre-launch waiting states; fold them into
        // the closest of the four reported buckets.
        JobStatus::Queued | JobStatus::Pending => JobClassification::Queued,
        JobStatus::Running | JobStatus::Starting => JobClassification::Running,
    }
}

/// Polls the store for terminal states of `job_ids`, interleaving host
/// syncs, until every job is terminal or `deadline` elapses.
pub async fn watch(
    store: &JobStore,
    synchronizer: &Synchronizer,
    job_ids: &[JobId],
    deadline: Duration,
) -> Result<HashMap<JobId, JobClassification>, EngineError> {
    let start = std::time::Instant::now();
    loop {
        synchronizer.sync_all_hosts(false).await?;

        let mut classifications = HashMap::new();
        let mut all_terminal = true;
        for &id in job_ids {
            let job = store.get_job(id)?.ok_or(EngineError::JobNotFound(id))?;
            let classification = classify(&job);
            if !classification.is_terminal() {
                all_terminal = false;
            }
            classifications.insert(id, classification);
        }

        if all_terminal || start.elapsed() >= deadline {
            return Ok(classifications);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rj_core::job::JobStatus;
    use rj_shell::FakeTransport;
    use rj_storage::JobStore;

    fn coordinator(transport: FakeTransport) -> (Coordinator, Arc<JobStore>) {
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let coordinator = Coordinator::new(store.clone(), Arc::new(transport), None)
            .with_retry_policy(rj_shell::RetryPolicy::NONE);
        (coordinator, store)
    }

    #[test]
    fn decodes_a_mixed_plan() {
        let yaml = r#"
version: 1
kill: [3]
entries:
  - job:
      host: build1
      command: make test
  - parallel:
      dir: ~/work
      jobs:
        - host: build1
          command: make a
        - host: build2
          command: make b
  - series:
      queue: nightly
      wait: any
      jobs:
        - host: build1
          command: step1
        - host: build1
          command: step2
"#;
        let plan = PlanFile::from_yaml_str(yaml).unwrap();
        assert_eq!(plan.version, 1);
        assert_eq!(plan.kill, vec![JobId::new(3)]);
        assert_eq!(plan.entries.len(), 3);
        plan.validate().unwrap();
    }

    #[test]
    fn rejects_unsupported_version() {
        let plan = PlanFile {
            version: 2,
            kill: vec![],
            entries: vec![],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn rejects_series_mixing_hosts() {
        let plan = PlanFile {
            version: 1,
            kill: vec![],
            entries: vec![PlanEntry::Series(SeriesEntry {
                name: None,
                dir: None,
                env: HashMap::new(),
                queue: None,
                wait: Wait::Success,
                jobs: vec![
                    JobEntry {
                        name: None,
                        host: "h1".into(),
                        dir: None,
                        command: "a".into(),
                        description: None,
                        env: HashMap::new(),
                        queue: None,
                        queue_only: false,
                    },
                    JobEntry {
                        name: None,
                        host: "h2".into(),
                        dir: None,
                        command: "b".into(),
                        description: None,
                        env: HashMap::new(),
                        queue: None,
                        queue_only: false,
                    },
                ],
            })],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn merge_env_prefers_child_on_collision() {
        let mut block = HashMap::new();
        block.insert("A".to_string(), "block".to_string());
        block.insert("B".to_string(), "block".to_string());
        let mut child = HashMap::new();
        child.insert("A".to_string(), "child".to_string());
        let merged = merge_env(&block, &child);
        assert!(merged.contains(&("A".to_string(), "child".to_string())));
        assert!(merged.contains(&("B".to_string(), "block".to_string())));
    }

    #[tokio::test]
    async fn series_chains_after_spec_with_wait_success() {
        let transport = FakeTransport::new();
        let (coordinator, _store) = coordinator(transport.clone());
        let plan = PlanFile {
            version: 1,
            kill: vec![],
            entries: vec![PlanEntry::Series(SeriesEntry {
                name: None,
                dir: None,
                env: HashMap::new(),
                queue: Some("nightly".into()),
                wait: Wait::Success,
                jobs: vec![
                    JobEntry {
                        name: None,
                        host: "h1".into(),
                        dir: None,
                        command: "step1".into(),
                        description: None,
                        env: HashMap::new(),
                        queue: None,
                        queue_only: false,
                    },
                    JobEntry {
                        name: None,
                        host: "h1".into(),
                        dir: None,
                        command: "step2".into(),
                        description: None,
                        env: HashMap::new(),
                        queue: None,
                        queue_only: false,
                    },
                ],
            })],
        };

        let ids = run_plan(&coordinator, &plan, false).await.unwrap();
        assert_eq!(ids.len(), 2);

        let contents = transport.file("h1", "~/.cache/rj/queue/nightly.queue").unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let second = rj_core::queue_line::QueueLine::parse_line(lines[1]).unwrap();
        assert_eq!(
            second.after,
            rj_core::queue_line::AfterSpec::Success(ids[0])
        );
    }

    #[tokio::test]
    async fn watch_reports_succeeded_once_completed() {
        let transport = FakeTransport::new();
        let (coordinator, store) = coordinator(transport.clone());
        let outcome = coordinator
            .start_job("h1", "~/work", "true", None, vec![], None, false)
            .await
            .unwrap();
        store
            .record_completion_by_id(outcome.job_id, 0, 2)
            .unwrap();

        let synchronizer = Synchronizer::new(store.clone(), Arc::new(transport));
        let result = watch(&store, &synchronizer, &[outcome.job_id], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result[&outcome.job_id], JobClassification::Succeeded);
    }

    #[test]
    fn classify_buckets_every_status() {
        let mut job = Job::test_fixture(JobId::new(1), JobStatus::Running);
        assert_eq!(classify(&job), JobClassification::Running);
        job.status = JobStatus::Queued;
        assert_eq!(classify(&job), JobClassification::Queued);
        job.status = JobStatus::Dead;
        assert_eq!(classify(&job), JobClassification::Failed);
        job.status = JobStatus::Completed;
        job.exit_code = Some(0);
        assert_eq!(classify(&job), JobClassification::Succeeded);
        job.exit_code = Some(1);
        assert_eq!(classify(&job), JobClassification::Failed);
    }
}
