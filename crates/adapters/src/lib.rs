// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rj-adapters: deployable remote-side script templates and the local
//! notification seam.
//!
//! Two concerns live here: generating the shell script bundles that get
//! written to a host's `~/.cache/rj/scripts/` directory (the queue runner
//! loop and the job-completion notify helper), and deploying them
//! idempotently over a [`rj_shell::Transport`]; plus a `Notifier` trait so
//! the rest of the workspace can react to job lifecycle events without
//! depending on any particular delivery mechanism.

mod deploy;
mod notify;
mod scripts;

pub use deploy::{deploy_if_changed, DeployError};
pub use notify::{NoOpNotifier, Notifier, NotifyError, WebhookNotifier};
pub use scripts::{notify_helper_script, queue_runner_script};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifier, NotifyCall};
