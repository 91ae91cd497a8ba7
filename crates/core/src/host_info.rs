// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cached static system info for a host. Written by an out-of-core
//! collector, read by clients, persisted in the same store as jobs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A host-info cache row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub host: String,
    pub arch: String,
    pub cpu_count: u32,
    pub cpu_model: String,
    pub memory_bytes: u64,
    /// Opaque GPU inventory, shape owned by the external collector.
    pub gpus: Value,
    pub last_updated: i64,
}

/// Seam for the out-of-core host-info collector. `rj-storage` only
/// needs to read and overwrite rows; it never computes them.
pub trait HostInfoWriter: Send + Sync {
    fn write_host_info(&self, info: HostInfo) -> Result<(), crate::RjError>;
}
