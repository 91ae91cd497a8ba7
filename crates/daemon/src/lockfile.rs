// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory single-writer lock so two `rjd` instances never run a sync
//! loop against the same store concurrently.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another rjd instance is already running (lock held at {0})")]
    AlreadyRunning(PathBuf),
    #[error("io error acquiring lock at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Holds the exclusive lock for the process lifetime; releases it on drop.
pub struct Lock {
    #[allow(dead_code)]
    file: File,
}

/// Acquires the advisory lock at `path`, writing this process's PID once
/// held. The lock is released when the returned [`Lock`] is dropped.
pub fn acquire(path: &Path) -> Result<Lock, LockError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    file.try_lock_exclusive()
        .map_err(|_| LockError::AlreadyRunning(path.to_path_buf()))?;

    let mut file = file;
    file.set_len(0).map_err(|source| LockError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    writeln!(file, "{}", std::process::id()).map_err(|source| LockError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Lock { file })
}
