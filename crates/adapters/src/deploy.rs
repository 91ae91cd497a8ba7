// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent deployment of generated scripts to a remote host: only
//! writes when the remote copy is missing or its content differs, so
//! repeated sync cycles don't needlessly touch the host's filesystem or
//! restart a running queue runner by rewriting its own script mid-flight.

use rj_core::error::TransportFailure;
use rj_shell::{Deadline, Transport};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("transport failure deploying {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: TransportFailure,
    },
}

/// Writes `contents` to `path` on `host` only if the remote file is absent
/// or its contents differ. Returns whether a write occurred.
pub async fn deploy_if_changed(
    transport: &dyn Transport,
    host: &str,
    path: &str,
    contents: &str,
) -> Result<bool, DeployError> {
    let existing = transport.read_remote_file(host, path, Deadline::SYNC_FAST).await;
    let needs_write = match existing {
        Ok(current) => current != contents,
        Err(err) if err.is_connection() => {
            return Err(DeployError::Transport {
                path: path.to_string(),
                source: err,
            })
        }
        Err(_) => true,
    };

    if !needs_write {
        return Ok(false);
    }

    transport
        .write_remote_file(host, path, contents, Deadline::SYNC_FULL)
        .await
        .map_err(|source| DeployError::Transport {
            path: path.to_string(),
            source,
        })?;
    Ok(true)
}
