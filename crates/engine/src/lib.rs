// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rj-engine: the Lifecycle Coordinator, Synchronizer, and Plan Scheduler.
//!
//! This crate composes `rj-storage` (the local record of truth),
//! `rj-shell` (the remote interaction layer), and `rj-adapters` (deployed
//! scripts and notification) into the state-machine-driving operations the
//! rest of the workspace calls: start/queue/kill/restart a job, reconcile
//! the store with remote reality, and drive a multi-job plan to
//! completion.

mod error;
mod lifecycle;
mod plan;
mod queue_file;
mod sync;

pub use error::EngineError;
pub use lifecycle::Coordinator;
pub use plan::{
    classify, run_plan, watch, JobClassification, JobEntry, ParallelEntry, PlanEntry, PlanFile,
    SeriesEntry, Wait,
};
pub use sync::{parse_duration, Synchronizer};
