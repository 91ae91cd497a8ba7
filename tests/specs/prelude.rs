//! Shared scaffolding for the behavioral scenarios in `tests/specs/`.
//!
//! Every scenario drives `rj-engine`'s `Coordinator`/`Synchronizer` against
//! an in-memory `JobStore` and a `FakeTransport` standing in for a real SSH
//! fleet, the same double the engine crate's own unit tests use. These
//! tests exercise the same APIs the `rj`/`rjd` binaries call into, just
//! without spawning them as subprocesses against a real SSH fleet.

#![allow(dead_code)]

use std::sync::Arc;

use rj_core::id::JobId;
use rj_core::job::JobStatus;
use rj_core::paths;
use rj_core::queue_line::QueueLine;
use rj_engine::Coordinator;
use rj_engine::Synchronizer;
use rj_shell::FakeTransport;
use rj_storage::JobStore;

/// A `Coordinator` and `Synchronizer` sharing one in-memory store and one
/// fake transport, plus the transport itself for seeding/asserting remote
/// state.
pub struct Harness {
    pub coordinator: Coordinator,
    pub synchronizer: Synchronizer,
    pub store: Arc<JobStore>,
    pub transport: FakeTransport,
}

impl Harness {
    pub fn new() -> Self {
        let transport = FakeTransport::new();
        let store = Arc::new(JobStore::open_in_memory().expect("open in-memory store"));
        let coordinator = Coordinator::new(store.clone(), Arc::new(transport.clone()), None)
            .with_retry_policy(rj_shell::RetryPolicy::NONE);
        let synchronizer = Synchronizer::new(store.clone(), Arc::new(transport.clone()));
        Self {
            coordinator,
            synchronizer,
            store,
            transport,
        }
    }

    pub fn job(&self, id: JobId) -> rj_core::job::Job {
        self.store
            .get_job(id)
            .expect("store lookup")
            .unwrap_or_else(|| panic!("job {id} not found"))
    }

    pub fn status(&self, id: JobId) -> JobStatus {
        self.job(id).status
    }

    /// Simulates the remote envelope script finishing: removes the tmux
    /// session and drops an exit-code status file where the synchronizer
    /// expects it.
    pub fn finish_remote(&self, id: JobId, exit_code: i32) {
        let job = self.job(id);
        let session = job.session_name();
        let paths = paths::job_paths(&job);
        self.transport.remove_session(&job.host, &session);
        self.transport
            .seed_file(&job.host, &paths.status, &exit_code.to_string());
    }

    /// Simulates the remote session simply vanishing with no status file,
    /// as happens when a host reboots mid-job.
    pub fn vanish_remote(&self, id: JobId) {
        let job = self.job(id);
        let session = job.session_name();
        self.transport.remove_session(&job.host, &session);
    }

    /// Pops the oldest line off `host`/`queue_name`'s queue file, mimicking
    /// one iteration of the remote queue runner script without actually
    /// running bash on a fake host.
    pub async fn dequeue_one(&self, host: &str, queue_name: &str) -> Option<QueueLine> {
        let paths = paths::queue_paths(queue_name);
        let text = self.transport.file(host, &paths.queue)?;
        let mut lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return None;
        }
        let head = lines.remove(0);
        let parsed = QueueLine::parse_line(head).ok()?;
        let rest: String = lines.iter().map(|l| format!("{l}\n")).collect();
        self.transport.seed_file(host, &paths.queue, &rest);
        Some(parsed)
    }
}
