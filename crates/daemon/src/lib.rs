// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rj-daemon: process wiring for `rjd`, the background sync process.
//!
//! Loads `config.yaml`, acquires the single-writer lock, and drives
//! `rj-engine::Synchronizer` on a timer. No socket, no client protocol: the
//! store is a local file every `rj` CLI invocation already opens directly,
//! so `rjd`'s only job is to keep it caught up with remote reality while
//! nothing else is watching.

pub mod config;
pub mod lockfile;

pub use config::{Config, ConfigError};
pub use lockfile::{Lock, LockError};
