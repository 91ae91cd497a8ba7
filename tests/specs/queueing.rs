//! Queue-on-fail and move-queued behavior.

use rj_core::job::JobStatus;

use crate::prelude::Harness;

#[tokio::test]
async fn queue_on_fail_against_an_unreachable_host_lands_in_pending() {
    let h = Harness::new();
    h.transport.mark_unreachable("h1");

    let outcome = h
        .coordinator
        .start_job("h1", "~/work", "true", None, Vec::new(), None, true)
        .await
        .unwrap();
    assert!(outcome.queued_on_failure);
    assert_eq!(h.status(outcome.job_id), JobStatus::Pending);

    // Once the host comes back, a retried start carries the job through the
    // same starting -> running path a fresh start would.
    h.transport.mark_reachable("h1");
    let job = h.job(outcome.job_id);
    let retried = h
        .coordinator
        .start_job(&job.host, &job.working_dir, &job.command, None, Vec::new(), None, false)
        .await
        .unwrap();
    assert!(!retried.queued_on_failure);
    assert_eq!(h.status(retried.job_id), JobStatus::Running);
}

#[tokio::test]
async fn start_without_queue_on_fail_surfaces_the_connection_error() {
    let h = Harness::new();
    h.transport.mark_unreachable("h1");

    let err = h
        .coordinator
        .start_job("h1", "~/work", "true", None, Vec::new(), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, rj_engine::EngineError::Transport(_)));
}

#[tokio::test]
async fn move_queued_relocates_the_job_and_rewrites_both_queue_files() {
    let h = Harness::new();
    let job_id = h
        .coordinator
        .queue_job("h1", "~/work", "make release", None, "default", Vec::new(), None, false)
        .await
        .unwrap();
    assert_eq!(h.status(job_id), JobStatus::Queued);

    h.coordinator.move_queued(job_id, "h2").await.unwrap();

    let job = h.job(job_id);
    assert_eq!(job.host, "h2");
    assert_eq!(job.status, JobStatus::Queued);

    let h1_queue = h
        .transport
        .file("h1", &rj_core::paths::queue_paths("default").queue)
        .unwrap_or_default();
    assert!(!h1_queue.contains("make release"));

    let h2_queue = h
        .transport
        .file("h2", &rj_core::paths::queue_paths("default").queue)
        .unwrap_or_default();
    assert!(h2_queue.contains("make release"));
}

#[tokio::test]
async fn move_queued_against_an_unreachable_source_host_defers_the_removal() {
    let h = Harness::new();
    let job_id = h
        .coordinator
        .queue_job("h1", "~/work", "make release", None, "default", Vec::new(), None, false)
        .await
        .unwrap();

    h.transport.mark_unreachable("h1");
    h.coordinator.move_queued(job_id, "h2").await.unwrap();

    // The local store already reflects the new host even though the old
    // queue file hasn't been rewritten yet.
    assert_eq!(h.job(job_id).host, "h2");
    let deferred = h.store.get_deferred_operations("h1").unwrap();
    assert_eq!(deferred.len(), 1);

    h.transport.mark_reachable("h1");
    h.synchronizer.fast_sync_host("h1").await.unwrap();
    assert!(h.store.get_deferred_operations("h1").unwrap().is_empty());
}

#[tokio::test]
async fn fleet_sync_drains_deferred_ops_on_a_host_with_no_active_jobs() {
    let h = Harness::new();
    let job_id = h
        .coordinator
        .queue_job("h1", "~/work", "make release", None, "default", Vec::new(), None, false)
        .await
        .unwrap();

    h.transport.mark_unreachable("h1");
    h.coordinator.move_queued(job_id, "h2").await.unwrap();

    // The job now lives on h2, so h1 has no active rows at all — only the
    // deferred removal. A fleet-wide sync must still visit it.
    h.transport.mark_reachable("h1");
    h.synchronizer.sync_all_hosts(false).await.unwrap();

    assert!(h.store.get_deferred_operations("h1").unwrap().is_empty());
}

#[tokio::test]
async fn move_queued_rejects_a_job_that_is_already_running() {
    let h = Harness::new();
    let outcome = h
        .coordinator
        .start_job("h1", "~/work", "true", None, Vec::new(), None, false)
        .await
        .unwrap();

    let err = h.coordinator.move_queued(outcome.job_id, "h2").await.unwrap_err();
    assert!(matches!(err, rj_engine::EngineError::InvalidArgument(_)));
}

#[tokio::test]
async fn queued_job_whose_session_appears_is_reconciled_to_running() {
    let h = Harness::new();
    let job_id = h
        .coordinator
        .queue_job("h1", "~/work", "make release", None, "default", Vec::new(), None, false)
        .await
        .unwrap();

    // The remote queue runner picked the job up on its own.
    let job = h.job(job_id);
    h.transport.seed_session("h1", &job.session_name());

    h.synchronizer.full_sync_host("h1").await.unwrap();
    assert_eq!(h.status(job_id), JobStatus::Running);
}
