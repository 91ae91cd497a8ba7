// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-modify-write helpers over a remote queue file. The `Transport` seam
//! has no append primitive, so every mutation here reads the whole file
//! (treating "not found" as empty), edits it in memory, and rewrites it via
//! the here-doc write path — small files, and it mirrors the
//! read-compare-write idiom `rj_adapters::deploy_if_changed` already uses.
//! The write itself lands via temp-file-then-rename (see the transport's
//! `write_remote_file`), so these rewrites never race the runner's own
//! atomic head-pop into a torn queue file. Shared by the coordinator
//! (initial enqueue, move-queued) and the synchronizer (replaying deferred
//! queue operations) so both sides agree on how a queue file gets mutated.

use rj_core::error::TransportFailure;
use rj_core::id::JobId;
use rj_core::paths;
use rj_core::queue_line::QueueLine;
use rj_shell::{Deadline, Transport};

use crate::error::EngineError;

pub async fn read_or_empty(
    transport: &dyn Transport,
    host: &str,
    path: &str,
) -> Result<String, EngineError> {
    match transport.read_remote_file(host, path, Deadline::SYNC_FULL).await {
        Ok(text) => Ok(text),
        Err(TransportFailure::Command { .. }) => Ok(String::new()),
        Err(err) => Err(EngineError::Transport(err)),
    }
}

pub async fn append_line(
    transport: &dyn Transport,
    host: &str,
    queue_name: &str,
    line: &QueueLine,
) -> Result<(), EngineError> {
    let paths = paths::queue_paths(queue_name);
    let mut existing = read_or_empty(transport, host, &paths.queue).await?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        existing.push('\n');
    }
    existing.push_str(&line.to_line());
    existing.push('\n');
    transport
        .write_remote_file(host, &paths.queue, &existing, Deadline::SYNC_FULL)
        .await?;
    Ok(())
}

/// Rewrites the queue file with every line whose job id matches `job_id`
/// dropped.
pub async fn remove_line(
    transport: &dyn Transport,
    host: &str,
    queue_name: &str,
    job_id: JobId,
) -> Result<(), EngineError> {
    let paths = paths::queue_paths(queue_name);
    let existing = read_or_empty(transport, host, &paths.queue).await?;
    let filtered: String = existing
        .lines()
        .filter(|line| {
            QueueLine::parse_line(line)
                .map(|parsed| parsed.job_id != job_id)
                .unwrap_or(true)
        })
        .map(|line| format!("{line}\n"))
        .collect();
    transport
        .write_remote_file(host, &paths.queue, &filtered, Deadline::SYNC_FULL)
        .await?;
    Ok(())
}
