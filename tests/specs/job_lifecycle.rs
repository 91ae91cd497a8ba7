//! Start/complete, vanish-without-trace, and restart behavior for directly
//! started (non-queued) jobs.

use rj_core::job::JobStatus;

use crate::prelude::Harness;

#[tokio::test]
async fn start_then_complete_transitions_through_running_to_completed() {
    let h = Harness::new();

    let outcome = h
        .coordinator
        .start_job("h1", "~/work", "true", None, Vec::new(), None, false)
        .await
        .unwrap();
    assert!(!outcome.queued_on_failure);
    assert_eq!(h.status(outcome.job_id), JobStatus::Running);

    h.finish_remote(outcome.job_id, 0);
    h.synchronizer.fast_sync_host("h1").await.unwrap();

    let job = h.job(outcome.job_id);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.exit_code, Some(0));
    assert!(job.end_time.is_some());
}

#[tokio::test]
async fn session_vanishing_without_a_status_file_is_marked_dead() {
    let h = Harness::new();

    let outcome = h
        .coordinator
        .start_job("h1", "~/work", "long-running-thing", None, Vec::new(), None, false)
        .await
        .unwrap();

    h.vanish_remote(outcome.job_id);
    h.synchronizer.fast_sync_host("h1").await.unwrap();

    let job = h.job(outcome.job_id);
    assert_eq!(job.status, JobStatus::Dead);
    assert!(job.end_time.is_some());
    assert!(job.exit_code.is_none());
}

#[tokio::test]
async fn restart_launches_a_new_job_and_leaves_the_old_one_alone() {
    let h = Harness::new();

    let outcome = h
        .coordinator
        .start_job("h1", "~/work", "false", None, Vec::new(), None, false)
        .await
        .unwrap();
    h.finish_remote(outcome.job_id, 1);
    h.synchronizer.fast_sync_host("h1").await.unwrap();
    assert_eq!(h.status(outcome.job_id), JobStatus::Completed);

    let new_id = h.coordinator.restart_job(outcome.job_id).await.unwrap();
    assert_ne!(new_id, outcome.job_id);

    let old = h.job(outcome.job_id);
    assert_eq!(old.status, JobStatus::Completed);

    let fresh = h.job(new_id);
    assert_eq!(fresh.host, old.host);
    assert_eq!(fresh.working_dir, old.working_dir);
    assert_eq!(fresh.command, old.command);
    assert_eq!(fresh.status, JobStatus::Running);
}

#[tokio::test]
async fn two_sequential_kills_converge_to_dead_without_erroring_twice() {
    let h = Harness::new();
    let outcome = h
        .coordinator
        .start_job("h1", "~/work", "sleep 100", None, Vec::new(), None, false)
        .await
        .unwrap();

    h.coordinator.kill_job(outcome.job_id).await.unwrap();
    assert_eq!(h.status(outcome.job_id), JobStatus::Dead);

    h.coordinator.kill_job(outcome.job_id).await.unwrap();
    assert_eq!(h.status(outcome.job_id), JobStatus::Dead);
}
