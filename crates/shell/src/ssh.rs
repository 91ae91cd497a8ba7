// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-backed transport over the system `ssh` binary. The wire
//! protocol itself is an external collaborator; this adapter only needs to shell out and classify
//! whatever comes back.

use async_trait::async_trait;
use rj_core::error::TransportFailure;
use rj_core::quoting::{escape_for_single_quotes, single_quote_wrap};
use tokio::process::Command;

use crate::classify::classify_stderr;
use crate::transport::{CommandOutput, Deadline, Transport};

/// Invokes `ssh {host} {command}` for every operation. `ssh_binary` and
/// extra args (e.g. `-o BatchMode=yes`, an identity file, a config path)
/// are configurable so tests and deployments don't need a hardcoded PATH
/// lookup.
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    ssh_binary: String,
    extra_args: Vec<String>,
}

impl Default for OpenSshTransport {
    fn default() -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            extra_args: vec!["-o".into(), "BatchMode=yes".into()],
        }
    }
}

impl OpenSshTransport {
    pub fn new(ssh_binary: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            ssh_binary: ssh_binary.into(),
            extra_args,
        }
    }

    async fn exec(
        &self,
        host: &str,
        remote_command: &str,
        deadline: Deadline,
    ) -> Result<CommandOutput, TransportFailure> {
        let mut cmd = Command::new(&self.ssh_binary);
        cmd.args(&self.extra_args).arg(host).arg(remote_command);

        let output = tokio::time::timeout(deadline.0, cmd.output())
            .await
            .map_err(|_| TransportFailure::Connection(format!("ssh to {host} timed out")))?
            .map_err(|e| TransportFailure::Connection(format!("failed to spawn ssh: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() && classify_stderr(&stderr) {
            return Err(TransportFailure::Connection(stderr));
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    fn require_success(out: CommandOutput) -> Result<CommandOutput, TransportFailure> {
        if out.success() {
            Ok(out)
        } else {
            Err(TransportFailure::Command {
                exit_code: Some(out.exit_code),
                stderr: out.stderr,
            })
        }
    }
}

#[async_trait]
impl Transport for OpenSshTransport {
    async fn run_command(
        &self,
        host: &str,
        command: &str,
        deadline: Deadline,
    ) -> Result<CommandOutput, TransportFailure> {
        self.exec(host, command, deadline).await
    }

    async fn check_session_exists(
        &self,
        host: &str,
        session: &str,
        deadline: Deadline,
    ) -> Result<bool, TransportFailure> {
        let cmd = format!("tmux has-session -t {session} 2>/dev/null");
        let out = self.exec(host, &cmd, deadline).await?;
        Ok(out.success())
    }

    async fn kill_session(
        &self,
        host: &str,
        session: &str,
        deadline: Deadline,
    ) -> Result<(), TransportFailure> {
        let cmd = format!("tmux kill-session -t {session} 2>/dev/null; true");
        self.exec(host, &cmd, deadline).await?;
        Ok(())
    }

    async fn spawn_session(
        &self,
        host: &str,
        session: &str,
        cwd: &str,
        command: &str,
        deadline: Deadline,
    ) -> Result<(), TransportFailure> {
        let wrapped = single_quote_wrap(&escape_for_single_quotes(command));
        let cmd = format!("tmux new-session -d -s {session} -c {cwd} {wrapped}");
        let out = self.exec(host, &cmd, deadline).await?;
        Self::require_success(out)?;
        Ok(())
    }

    async fn read_remote_file(
        &self,
        host: &str,
        path: &str,
        deadline: Deadline,
    ) -> Result<String, TransportFailure> {
        let cmd = format!("cat {path}");
        let out = self.exec(host, &cmd, deadline).await?;
        let out = Self::require_success(out)?;
        Ok(out.stdout)
    }

    /// The queue file is shared with the remote runner's own atomic
    /// head-pop, so the write lands in a temp file and renames into place;
    /// a reader never observes a partially written file, and a connection
    /// dropped mid-heredoc leaves the target untouched.
    async fn write_remote_file(
        &self,
        host: &str,
        path: &str,
        contents: &str,
        deadline: Deadline,
    ) -> Result<(), TransportFailure> {
        let dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or(".");
        let marker = "RJ_EOF_MARKER";
        let cmd = format!(
            "mkdir -p {dir} && cat > {path}.tmp.$$ <<'{marker}'\n{contents}\n{marker}\nchmod 755 {path}.tmp.$$ && mv {path}.tmp.$$ {path}"
        );
        let out = self.exec(host, &cmd, deadline).await?;
        Self::require_success(out)?;
        Ok(())
    }

    async fn capture_terminal_output(
        &self,
        host: &str,
        session: &str,
        lines: u32,
        deadline: Deadline,
    ) -> Result<String, TransportFailure> {
        let cmd = format!("tmux capture-pane -p -t {session} -S -{lines}");
        let out = self.exec(host, &cmd, deadline).await?;
        let out = Self::require_success(out)?;
        Ok(out.stdout)
    }
}
