// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Current schema DDL. See `migration.rs` for evolving an older database
//! into this shape.

pub const CREATE_JOBS: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
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
);
"#;

pub const CREATE_JOBS_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_jobs_host ON jobs(host);",
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);",
    "CREATE INDEX IF NOT EXISTS idx_jobs_start_time ON jobs(start_time DESC);",
];

pub const CREATE_HOSTS: &str = r#"
CREATE TABLE IF NOT EXISTS hosts (
    host          TEXT PRIMARY KEY,
    arch          TEXT    NOT NULL,
    cpu_count     INTEGER NOT NULL,
    cpu_model     TEXT    NOT NULL,
    memory_bytes  INTEGER NOT NULL,
    gpus          TEXT    NOT NULL,
    last_updated  INTEGER NOT NULL
);
"#;

pub const CREATE_DEFERRED_OPERATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS deferred_operations (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    host            TEXT    NOT NULL,
    kind            TEXT    NOT NULL,
    target_job_id   INTEGER NOT NULL,
    queue_name      TEXT,
    created_at      INTEGER NOT NULL
);
"#;

pub const CREATE_DEFERRED_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_deferred_host_created ON deferred_operations(host, created_at);",
];
