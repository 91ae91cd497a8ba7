// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rj-shell: the Remote Interaction Layer.
//!
//! Issues shell commands over an SSH-shaped transport, classifies failures
//! into connection vs. command kinds, and layers retry-with-backoff on top
//! of a single `Transport` implementation. The transport trait treats the
//! wire protocol as a fallible request/response channel; `OpenSshTransport`
//! is a real process-backed implementation of that seam.

mod classify;
mod retry;
mod ssh;
mod transport;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use classify::classify_stderr;
pub use retry::{RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
pub use rj_core::error::TransportFailure;
pub use ssh::OpenSshTransport;
pub use transport::{CommandOutput, Deadline, Transport, TransportExt};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCall, FakeTransport};
