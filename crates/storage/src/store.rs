// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job Store operations.
//!
//! The store holds a single `rusqlite::Connection` behind a mutex: SQLite
//! itself enforces single-writer discipline, and serializing access here
//! keeps every mutation a single atomic statement or a small transactional
//! sequence, so state transitions for a given job stay totally ordered
//! without needing a separate locking layer.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use rj_core::deferred::{DeferredOpKind, DeferredOperation, DeferredOperationId};
use rj_core::host_info::HostInfo;
use rj_core::job::{Job, JobStatus};
use rj_core::id::JobId;

use crate::error::StoreError;
use crate::migration;

/// Optional filters for `list_jobs`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub host: Option<String>,
}

/// Filters for `prune`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneOptions {
    pub dead_too: bool,
    /// Only prune jobs whose start_time is older than this epoch-seconds
    /// cutoff; `None` means no age filter.
    pub older_than: Option<i64>,
}

pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migration::ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ---- insertion ----------------------------------------------------

    pub fn record_starting(
        &self,
        host: &str,
        cwd: &str,
        cmd: &str,
        desc: Option<&str>,
        now: i64,
    ) -> Result<JobId, StoreError> {
        self.insert(host, cwd, cmd, desc, "", Some(now), JobStatus::Starting)
    }

    pub fn record_queued(
        &self,
        host: &str,
        cwd: &str,
        cmd: &str,
        desc: Option<&str>,
        queue: &str,
    ) -> Result<JobId, StoreError> {
        self.insert(host, cwd, cmd, desc, queue, None, JobStatus::Queued)
    }

    pub fn record_pending(
        &self,
        host: &str,
        cwd: &str,
        cmd: &str,
        desc: Option<&str>,
        now: i64,
    ) -> Result<JobId, StoreError> {
        self.insert(host, cwd, cmd, desc, "", Some(now), JobStatus::Pending)
    }

    fn insert(
        &self,
        host: &str,
        cwd: &str,
        cmd: &str,
        desc: Option<&str>,
        queue: &str,
        start_time: Option<i64>,
        status: JobStatus,
    ) -> Result<JobId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO jobs (host, working_dir, command, description, queue_name, start_time, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![host, cwd, cmd, desc, queue, start_time, status.as_str()],
        )?;
        Ok(JobId::new(conn.last_insert_rowid()))
    }

    // ---- transitions ----------------------------------------------------

    /// Conditional update: no-op (returns `Ok(false)`) if the current
    /// status differs from `from`.
    pub fn transition(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE jobs SET status = ?1,
                start_time = CASE WHEN ?1 = 'running' AND start_time IS NULL
                                  THEN strftime('%s','now') ELSE start_time END
             WHERE id = ?2 AND status = ?3",
            params![to.as_str(), id.get(), from.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Only valid from `starting`.
    pub fn mark_failed(&self, id: JobId, error_message: &str, now: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed', error_message = ?1, end_time = ?2
             WHERE id = ?3 AND status = 'starting'",
            params![error_message, now, id.get()],
        )?;
        Ok(changed > 0)
    }

    /// Only valid from `running` or `queued`. Idempotent: once a job is
    /// `completed`, a repeated call with the same arguments changes nothing
    /// because the `WHERE status IN (...)` guard no longer matches.
    pub fn record_completion_by_id(
        &self,
        id: JobId,
        exit_code: i32,
        end_time: i64,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE jobs SET status = 'completed', exit_code = ?1, end_time = ?2
             WHERE id = ?3 AND status IN ('running', 'queued')",
            params![exit_code, end_time, id.get()],
        )?;
        Ok(changed > 0)
    }

    /// Only valid from `running` or `queued`. Idempotent for the same
    /// reason as [`Self::record_completion_by_id`].
    pub fn mark_dead_by_id(&self, id: JobId, end_time: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE jobs SET status = 'dead', end_time = ?1
             WHERE id = ?2 AND status IN ('running', 'queued')",
            params![end_time, id.get()],
        )?;
        Ok(changed > 0)
    }

    /// Reverses a `dead` misclassification discovered by a full sync: a
    /// queue-runner job marked dead during a transient outage whose remote
    /// session or status file turns out to exist after all. Only valid
    /// from `dead`.
    pub fn revive_dead(&self, id: JobId) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE jobs SET status = 'running', end_time = NULL,
                start_time = COALESCE(start_time, strftime('%s','now'))
             WHERE id = ?1 AND status = 'dead'",
            params![id.get()],
        )?;
        Ok(changed > 0)
    }

    /// Only valid for `queued` jobs.
    pub fn update_host(&self, id: JobId, new_host: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE jobs SET host = ?1 WHERE id = ?2 AND status = 'queued'",
            params![new_host, id.get()],
        )?;
        Ok(changed > 0)
    }

    pub fn set_description(&self, id: JobId, description: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE jobs SET description = ?1 WHERE id = ?2",
            params![description, id.get()],
        )?;
        Ok(changed > 0)
    }

    // ---- reads ----------------------------------------------------

    pub fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, host, working_dir, command, description, error_message, queue_name,
                    start_time, end_time, exit_code, status, legacy_session_name
             FROM jobs WHERE id = ?1",
            [id.get()],
            row_to_job,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn list_jobs(&self, filter: &JobFilter, limit: u32) -> Result<Vec<Job>, StoreError> {
        const COLUMNS: &str = "id, host, working_dir, command, description, error_message,
                    queue_name, start_time, end_time, exit_code, status, legacy_session_name";
        let conn = self.conn.lock();
        let rows = match (&filter.status, &filter.host) {
            (Some(s), Some(h)) => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM jobs WHERE status = ?1 AND host = ?2 ORDER BY start_time DESC LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![s.as_str(), h, limit], row_to_job)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            (Some(s), None) => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM jobs WHERE status = ?1 ORDER BY start_time DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![s.as_str(), limit], row_to_job)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            (None, Some(h)) => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM jobs WHERE host = ?1 ORDER BY start_time DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![h, limit], row_to_job)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            (None, None) => {
                let sql = format!("SELECT {COLUMNS} FROM jobs ORDER BY start_time DESC LIMIT ?1");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![limit], row_to_job)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    /// Running + queued jobs for a host.
    pub fn list_active(&self, host: &str) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, host, working_dir, command, description, error_message, queue_name,
                    start_time, end_time, exit_code, status, legacy_session_name
             FROM jobs WHERE host = ?1 AND status IN ('running', 'queued')
             ORDER BY start_time DESC",
        )?;
        let rows = stmt.query_map([host], row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn list_unique_active_hosts(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT host FROM jobs WHERE status IN ('running', 'queued') ORDER BY host",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Hosts the synchronizer must visit: those with active jobs plus those
    /// with deferred operations still waiting to drain. A host whose last
    /// active job moved away can otherwise hold undrained deferred work
    /// forever without ever matching the active-host list.
    pub fn list_hosts_needing_sync(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT host FROM jobs WHERE status IN ('running', 'queued')
             UNION
             SELECT DISTINCT host FROM deferred_operations
             ORDER BY host",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn search(&self, query: &str, limit: u32) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, host, working_dir, command, description, error_message, queue_name,
                    start_time, end_time, exit_code, status, legacy_session_name
             FROM jobs
             WHERE command LIKE ?1 OR description LIKE ?1 OR host LIKE ?1
             ORDER BY start_time DESC LIMIT ?2",
        )?;
        let pattern = format!("%{query}%");
        let rows = stmt.query_map(params![pattern, limit], row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Deletes `completed` jobs, and `dead` jobs too when `dead_too` is set,
    /// optionally filtered to those whose start_time predates `older_than`.
    pub fn prune(&self, opts: PruneOptions) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let statuses: &[&str] = if opts.dead_too {
            &["completed", "dead"]
        } else {
            &["completed"]
        };
        let mut deleted = 0u64;
        for status in statuses {
            let changed = match opts.older_than {
                Some(cutoff) => conn.execute(
                    "DELETE FROM jobs WHERE status = ?1 AND start_time IS NOT NULL AND start_time < ?2",
                    params![status, cutoff],
                )?,
                None => conn.execute("DELETE FROM jobs WHERE status = ?1", params![status])?,
            };
            deleted += changed as u64;
        }
        Ok(deleted)
    }

    // ---- deferred operations ----------------------------------------------------

    pub fn add_deferred_operation(
        &self,
        host: &str,
        kind: DeferredOpKind,
        target_job_id: JobId,
        queue_name: Option<&str>,
        created_at: i64,
    ) -> Result<DeferredOperationId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO deferred_operations (host, kind, target_job_id, queue_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![host, kind.as_str(), target_job_id.get(), queue_name, created_at],
        )?;
        Ok(DeferredOperationId::new(conn.last_insert_rowid()))
    }

    /// Deferred operations for a host, ordered by creation time.
    pub fn get_deferred_operations(
        &self,
        host: &str,
    ) -> Result<Vec<DeferredOperation>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, host, kind, target_job_id, queue_name, created_at
             FROM deferred_operations WHERE host = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([host], row_to_deferred)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn delete_deferred_operation(&self, id: DeferredOperationId) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM deferred_operations WHERE id = ?1",
            [id.get()],
        )?;
        Ok(changed > 0)
    }

    // ---- host info cache ----------------------------------------------------

    pub fn write_host_info(&self, info: &HostInfo) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO hosts (host, arch, cpu_count, cpu_model, memory_bytes, gpus, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(host) DO UPDATE SET
                arch = excluded.arch,
                cpu_count = excluded.cpu_count,
                cpu_model = excluded.cpu_model,
                memory_bytes = excluded.memory_bytes,
                gpus = excluded.gpus,
                last_updated = excluded.last_updated",
            params![
                info.host,
                info.arch,
                info.cpu_count,
                info.cpu_model,
                info.memory_bytes,
                info.gpus.to_string(),
                info.last_updated,
            ],
        )?;
        Ok(())
    }

    pub fn get_host_info(&self, host: &str) -> Result<Option<HostInfo>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT host, arch, cpu_count, cpu_model, memory_bytes, gpus, last_updated
             FROM hosts WHERE host = ?1",
            [host],
            row_to_host_info,
        )
        .optional()
        .map_err(StoreError::from)
    }
}

// The out-of-core host-info collector only sees this seam, not the store
// type itself.
impl rj_core::host_info::HostInfoWriter for JobStore {
    fn write_host_info(&self, info: HostInfo) -> Result<(), rj_core::RjError> {
        JobStore::write_host_info(self, &info).map_err(Into::into)
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let status_str: String = row.get(10)?;
    let status: JobStatus = status_str
        .parse()
        .map_err(|_| rusqlite::Error::InvalidColumnType(10, "status".into(), rusqlite::types::Type::Text))?;
    Ok(Job {
        id: JobId::new(row.get(0)?),
        host: row.get(1)?,
        working_dir: row.get(2)?,
        command: row.get(3)?,
        description: row.get(4)?,
        error_message: row.get(5)?,
        queue_name: row.get(6)?,
        start_time: row.get(7)?,
        end_time: row.get(8)?,
        exit_code: row.get(9)?,
        status,
        legacy_session_name: row.get(11)?,
    })
}

fn row_to_deferred(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeferredOperation> {
    let kind_str: String = row.get(2)?;
    let kind: DeferredOpKind = kind_str
        .parse()
        .map_err(|_| rusqlite::Error::InvalidColumnType(2, "kind".into(), rusqlite::types::Type::Text))?;
    Ok(DeferredOperation {
        id: DeferredOperationId::new(row.get(0)?),
        host: row.get(1)?,
        kind,
        target_job_id: JobId::new(row.get(3)?),
        queue_name: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_host_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<HostInfo> {
    let gpus_text: String = row.get(5)?;
    let gpus = serde_json::from_str(&gpus_text).unwrap_or(serde_json::Value::Null);
    Ok(HostInfo {
        host: row.get(0)?,
        arch: row.get(1)?,
        cpu_count: row.get(2)?,
        cpu_model: row.get(3)?,
        memory_bytes: row.get(4)?,
        gpus,
        last_updated: row.get(6)?,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
