// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migrations.
//!
//! On a fresh database, `ensure_schema` just creates the current tables.
//! On a database created by a version that declared `jobs.start_time` as
//! `NOT NULL` (before `queued` jobs existed), SQLite cannot `ALTER COLUMN`
//! to drop the constraint, so the implementation rebuilds the table:
//! create the new shape under a temporary name, copy rows across, drop the
//! old table, and rename — then recreate the indexes that named the old
//! table.

use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::schema;

pub fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    if table_exists(conn, "jobs")? && start_time_is_not_null(conn)? {
        migrate_nullable_start_time(conn)?;
    }

    conn.execute_batch(schema::CREATE_JOBS)?;
    conn.execute_batch(schema::CREATE_HOSTS)?;
    conn.execute_batch(schema::CREATE_DEFERRED_OPERATIONS)?;
    for stmt in schema::CREATE_JOBS_INDEXES
        .iter()
        .chain(schema::CREATE_DEFERRED_INDEXES)
    {
        conn.execute_batch(stmt)?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn start_time_is_not_null(conn: &Connection) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare("PRAGMA table_info(jobs)")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == "start_time" {
            let notnull: i64 = row.get(3)?;
            return Ok(notnull != 0);
        }
    }
    Ok(false)
}

fn migrate_nullable_start_time(conn: &Connection) -> Result<(), StoreError> {
    info!("migrating jobs table: relaxing start_time to nullable");
    conn.execute_batch(
        "CREATE TABLE jobs_new (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            host                TEXT    NOT NULL,
            working_dir         TEXT    NOT NULL,
            command             TEXT    NOT NULL,
            description         TEXT,
            error_message       TEXT,
            queue_name          TEXT    NOT NULL DEFAULT '',
            start_time          INTEGER,
            end_time            INTEGER,
            exit_code           INTEGER,
            status              TEXT    NOT NULL,
            legacy_session_name TEXT
        );",
    )?;
    conn.execute_batch(
        "INSERT INTO jobs_new (id, host, working_dir, command, description, error_message,
                                queue_name, start_time, end_time, exit_code, status,
                                legacy_session_name)
         SELECT id, host, working_dir, command, description, error_message,
                queue_name, start_time, end_time, exit_code, status, legacy_session_name
         FROM jobs;",
    )?;
    conn.execute_batch("DROP TABLE jobs;")?;
    conn.execute_batch("ALTER TABLE jobs_new RENAME TO jobs;")?;
    for stmt in schema::CREATE_JOBS_INDEXES {
        conn.execute_batch(stmt)?;
    }
    Ok(())
}
