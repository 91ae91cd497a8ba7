//! Multi-job plan dispatch: series chaining with `wait: success`, acting
//! out what the remote queue runner would do one FIFO pop at a time. The
//! runner lives entirely on the remote host (it launches the envelope and
//! writes status files itself); the local store only learns about it
//! through `Synchronizer` reconciliation, never through `start_job`.

use rj_core::job::JobStatus;
use rj_core::queue_line::AfterSpec;
use rj_engine::{run_plan, PlanEntry, PlanFile, SeriesEntry, Wait};

use crate::prelude::Harness;

fn a_then_b_plan(command_a: &str) -> PlanFile {
    let yaml = format!(
        r#"
version: 1
entries:
  - series:
      queue: nightly
      wait: success
      jobs:
        - host: h1
          command: "{command_a}"
        - host: h1
          command: "echo ok"
"#
    );
    PlanFile::from_yaml_str(&yaml).expect("valid plan yaml")
}

/// Simulates the runner popping its queue head and launching it remotely:
/// a tmux session appears under the job's id-derived name. The local store
/// only picks this up on the next sync.
fn runner_launches(h: &Harness, id: rj_core::id::JobId) {
    let job = h.job(id);
    h.transport.seed_session(&job.host, &job.session_name());
}

#[tokio::test]
async fn first_success_unblocks_the_second_queue_entry() {
    let h = Harness::new();
    let plan = a_then_b_plan("true");

    let ids = run_plan(&h.coordinator, &plan, false).await.unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(h.status(ids[0]), JobStatus::Queued);
    assert_eq!(h.status(ids[1]), JobStatus::Queued);

    // Runner pops job A: nothing blocks it, so it launches immediately.
    let line_a = h.dequeue_one("h1", "nightly").await.unwrap();
    assert_eq!(line_a.job_id, ids[0]);
    assert_eq!(line_a.after, AfterSpec::None);
    runner_launches(&h, ids[0]);
    h.synchronizer.full_sync_host("h1").await.unwrap();
    assert_eq!(h.status(ids[0]), JobStatus::Running);

    // B is still sitting in the queue behind an unmet dependency and the
    // runner hasn't popped it yet.
    assert_eq!(h.status(ids[1]), JobStatus::Queued);

    h.finish_remote(ids[0], 0);
    h.synchronizer.fast_sync_host("h1").await.unwrap();
    assert_eq!(h.status(ids[0]), JobStatus::Completed);

    // Runner re-checks its head entry, finds A completed successfully, pops
    // and launches B.
    let line_b = h.dequeue_one("h1", "nightly").await.unwrap();
    assert_eq!(line_b.job_id, ids[1]);
    assert_eq!(line_b.after, AfterSpec::Success(ids[0]));
    runner_launches(&h, ids[1]);
    h.synchronizer.full_sync_host("h1").await.unwrap();
    assert_eq!(h.status(ids[1]), JobStatus::Running);
}

#[tokio::test]
async fn a_failure_leaves_the_dependent_job_enqueued_indefinitely() {
    let h = Harness::new();
    let plan = a_then_b_plan("false");

    let ids = run_plan(&h.coordinator, &plan, false).await.unwrap();

    let line_a = h.dequeue_one("h1", "nightly").await.unwrap();
    assert_eq!(line_a.job_id, ids[0]);
    runner_launches(&h, ids[0]);
    h.synchronizer.full_sync_host("h1").await.unwrap();
    h.finish_remote(ids[0], 1);
    h.synchronizer.fast_sync_host("h1").await.unwrap();
    assert_eq!(h.status(ids[0]), JobStatus::Completed);
    assert_eq!(h.job(ids[0]).exit_code, Some(1));

    // The queue's head is B, gated on A's success. A real runner checks the
    // predicate before popping, so it never dequeues B; we only peek here.
    let paths = rj_core::paths::queue_paths("nightly");
    let contents = h.transport.file("h1", &paths.queue).unwrap();
    let head = rj_core::queue_line::QueueLine::parse_line(contents.lines().next().unwrap()).unwrap();
    assert_eq!(head.job_id, ids[1]);
    assert_eq!(head.after, AfterSpec::Success(ids[0]));
    assert_eq!(h.status(ids[1]), JobStatus::Queued);
}

#[test]
fn series_entries_mixing_hosts_fail_validation() {
    let plan = PlanFile {
        version: 1,
        kill: vec![],
        entries: vec![PlanEntry::Series(SeriesEntry {
            name: None,
            dir: None,
            env: Default::default(),
            queue: None,
            wait: Wait::Success,
            jobs: vec![
                rj_engine::JobEntry {
                    name: None,
                    host: "h1".into(),
                    dir: None,
                    command: "a".into(),
                    description: None,
                    env: Default::default(),
                    queue: None,
                    queue_only: false,
                },
                rj_engine::JobEntry {
                    name: None,
                    host: "h2".into(),
                    dir: None,
                    command: "b".into(),
                    description: None,
                    env: Default::default(),
                    queue: None,
                    queue_only: false,
                },
            ],
        })],
    };
    assert!(plan.validate().is_err());
}
