// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Transport` trait and the retry/timeout wrappers layered on top of it.

use std::time::Duration;

use async_trait::async_trait;
use rj_core::error::TransportFailure;

use crate::retry::RetryPolicy;

/// Captured output of a remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A deadline for a single transport call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(pub Duration);

impl Deadline {
    pub const SYNC_FAST: Deadline = Deadline(Duration::from_secs(5));
    pub const SYNC_FULL: Deadline = Deadline(Duration::from_secs(30));
}

/// The remote-interaction seam. Implementations carry their own notion of
/// how a command reaches the host (SSH process, in-memory fake, ...); every
/// method returns the connection/command classification from
/// [`TransportFailure`] rather than a generic I/O error, so callers can make
/// policy decisions without re-deriving the taxonomy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn run_command(
        &self,
        host: &str,
        command: &str,
        deadline: Deadline,
    ) -> Result<CommandOutput, TransportFailure>;

    async fn check_session_exists(
        &self,
        host: &str,
        session: &str,
        deadline: Deadline,
    ) -> Result<bool, TransportFailure>;

    async fn kill_session(
        &self,
        host: &str,
        session: &str,
        deadline: Deadline,
    ) -> Result<(), TransportFailure>;

    /// Starts `command` detached inside a new tmux session named `session`.
    async fn spawn_session(
        &self,
        host: &str,
        session: &str,
        cwd: &str,
        command: &str,
        deadline: Deadline,
    ) -> Result<(), TransportFailure>;

    async fn read_remote_file(
        &self,
        host: &str,
        path: &str,
        deadline: Deadline,
    ) -> Result<String, TransportFailure>;

    /// Writes `contents` to `path` via a here-doc.
    async fn write_remote_file(
        &self,
        host: &str,
        path: &str,
        contents: &str,
        deadline: Deadline,
    ) -> Result<(), TransportFailure>;

    /// Last `lines` lines of an attached tmux pane.
    async fn capture_terminal_output(
        &self,
        host: &str,
        session: &str,
        lines: u32,
        deadline: Deadline,
    ) -> Result<String, TransportFailure>;
}

/// Retry-with-backoff and timeout wrappers over any [`Transport`].
/// Blanket-implemented so every transport gets these policies for free; the
/// policies themselves live in [`RetryPolicy`] rather than here, so a
/// "quick" non-retrying call site (the synchronizer's fast sync) just uses
/// `policy = RetryPolicy::NONE`.
#[async_trait]
pub trait TransportExt: Transport {
    /// Attempts `run_command` up to `policy.attempts` times, sleeping
    /// `policy.delay` between attempts, but only on connection failures;
    /// a command failure short-circuits immediately.
    async fn run_with_retry(
        &self,
        host: &str,
        command: &str,
        deadline: Deadline,
        policy: RetryPolicy,
    ) -> Result<CommandOutput, TransportFailure> {
        let attempts = policy.attempts.max(1);
        for attempt in 1..=attempts {
            match self.run_command(host, command, deadline).await {
                Ok(out) => return Ok(out),
                Err(err) if err.is_connection() && attempt < attempts => {
                    tracing::warn!(host, attempt, "transport connection failure, retrying");
                    tokio::time::sleep(policy.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(TransportFailure::Connection(format!(
            "exhausted {attempts} attempt(s)"
        )))
    }

    /// Bounds wall-clock time for a single command invocation.
    async fn run_with_timeout(
        &self,
        host: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, TransportFailure> {
        match tokio::time::timeout(timeout, self.run_command(host, command, Deadline(timeout)))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportFailure::Connection(format!(
                "command timed out after {timeout:?}"
            ))),
        }
    }
}

impl<T: Transport + ?Sized> TransportExt for T {}
