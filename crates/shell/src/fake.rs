// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fake transport for `rj-engine` tests, mirroring the pattern
//! the session adapters elsewhere in this stack use for test doubles: a
//! call log plus pre-seeded responses, rather than a mock framework.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rj_core::error::TransportFailure;

use crate::transport::{CommandOutput, Deadline, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    RunCommand { host: String, command: String },
    CheckSession { host: String, session: String },
    KillSession { host: String, session: String },
    SpawnSession { host: String, session: String },
    ReadFile { host: String, path: String },
    WriteFile { host: String, path: String, contents: String },
    CaptureTerminal { host: String, session: String },
}

#[derive(Default)]
struct Inner {
    calls: Vec<FakeCall>,
    sessions: HashMap<(String, String), ()>,
    files: HashMap<(String, String), String>,
    /// Hosts that should return a connection failure for every call.
    unreachable: HashMap<String, ()>,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<Inner>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.inner.lock().calls.clone()
    }

    pub fn mark_unreachable(&self, host: &str) {
        self.inner.lock().unreachable.insert(host.to_string(), ());
    }

    pub fn mark_reachable(&self, host: &str) {
        self.inner.lock().unreachable.remove(host);
    }

    pub fn seed_session(&self, host: &str, session: &str) {
        self.inner
            .lock()
            .sessions
            .insert((host.to_string(), session.to_string()), ());
    }

    pub fn remove_session(&self, host: &str, session: &str) {
        self.inner
            .lock()
            .sessions
            .remove(&(host.to_string(), session.to_string()));
    }

    pub fn seed_file(&self, host: &str, path: &str, contents: &str) {
        self.inner
            .lock()
            .files
            .insert((host.to_string(), path.to_string()), contents.to_string());
    }

    pub fn file(&self, host: &str, path: &str) -> Option<String> {
        self.inner
            .lock()
            .files
            .get(&(host.to_string(), path.to_string()))
            .cloned()
    }

    fn guard(&self, host: &str) -> Result<(), TransportFailure> {
        if self.inner.lock().unreachable.contains_key(host) {
            return Err(TransportFailure::Connection(format!(
                "ssh: connect to host {host} port 22: Connection refused"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn run_command(
        &self,
        host: &str,
        command: &str,
        _deadline: Deadline,
    ) -> Result<CommandOutput, TransportFailure> {
        self.guard(host)?;
        self.inner.lock().calls.push(FakeCall::RunCommand {
            host: host.into(),
            command: command.into(),
        });
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn check_session_exists(
        &self,
        host: &str,
        session: &str,
        _deadline: Deadline,
    ) -> Result<bool, TransportFailure> {
        self.guard(host)?;
        let mut inner = self.inner.lock();
        inner.calls.push(FakeCall::CheckSession {
            host: host.into(),
            session: session.into(),
        });
        Ok(inner
            .sessions
            .contains_key(&(host.to_string(), session.to_string())))
    }

    async fn kill_session(
        &self,
        host: &str,
        session: &str,
        _deadline: Deadline,
    ) -> Result<(), TransportFailure> {
        self.guard(host)?;
        let mut inner = self.inner.lock();
        inner.calls.push(FakeCall::KillSession {
            host: host.into(),
            session: session.into(),
        });
        inner.sessions.remove(&(host.to_string(), session.to_string()));
        Ok(())
    }

    async fn spawn_session(
        &self,
        host: &str,
        session: &str,
        _cwd: &str,
        _command: &str,
        _deadline: Deadline,
    ) -> Result<(), TransportFailure> {
        self.guard(host)?;
        let mut inner = self.inner.lock();
        inner.calls.push(FakeCall::SpawnSession {
            host: host.into(),
            session: session.into(),
        });
        inner.sessions.insert((host.to_string(), session.to_string()), ());
        Ok(())
    }

    async fn read_remote_file(
        &self,
        host: &str,
        path: &str,
        _deadline: Deadline,
    ) -> Result<String, TransportFailure> {
        self.guard(host)?;
        let mut inner = self.inner.lock();
        inner.calls.push(FakeCall::ReadFile {
            host: host.into(),
            path: path.into(),
        });
        inner
            .files
            .get(&(host.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| TransportFailure::Command {
                exit_code: Some(1),
                stderr: format!("cat: {path}: No such file or directory"),
            })
    }

    async fn write_remote_file(
        &self,
        host: &str,
        path: &str,
        contents: &str,
        _deadline: Deadline,
    ) -> Result<(), TransportFailure> {
        self.guard(host)?;
        let mut inner = self.inner.lock();
        inner.calls.push(FakeCall::WriteFile {
            host: host.into(),
            path: path.into(),
            contents: contents.into(),
        });
        inner
            .files
            .insert((host.to_string(), path.to_string()), contents.to_string());
        Ok(())
    }

    async fn capture_terminal_output(
        &self,
        host: &str,
        session: &str,
        _lines: u32,
        _deadline: Deadline,
    ) -> Result<String, TransportFailure> {
        self.guard(host)?;
        self.inner.lock().calls.push(FakeCall::CaptureTerminal {
            host: host.into(),
            session: session.into(),
        });
        Ok(String::new())
    }
}
