// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rj-storage: the embedded single-file relational Job Store.
//!
//! A single-writer single-file store built on `rusqlite`, holding the
//! `jobs` table, the `hosts` host-info cache, and the `deferred_operations`
//! queue. Owns schema migrations.

mod error;
mod migration;
mod schema;
mod store;

pub use error::StoreError;
pub use store::{JobFilter, JobStore, PruneOptions};
