// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: `~/.config/rj/config.yaml`, with built-in
//! defaults when the file or any individual key is absent.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15;
const DEFAULT_LOG_REFRESH_INTERVAL_SECS: u64 = 300;
const DEFAULT_HOST_REFRESH_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a config directory for this user")]
    NoConfigDir,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Raw, partially-populated config file shape. Every field is optional so a
/// user's `config.yaml` only needs to override what it cares about.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    default_command: Option<String>,
    sync_interval: Option<String>,
    log_refresh_interval: Option<String>,
    host_refresh_interval: Option<String>,
    webhook_url: Option<String>,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `config.yaml` and `jobs.db`.
    pub config_dir: PathBuf,
    pub db_path: PathBuf,
    pub lock_path: PathBuf,
    pub default_command: Option<String>,
    pub sync_interval: std::time::Duration,
    /// Poll cadence for `rj logs --follow`; the daemon loop itself does not
    /// consume this key.
    pub log_refresh_interval: std::time::Duration,
    pub host_refresh_interval: std::time::Duration,
    /// When set, job completions and deaths are announced here: the
    /// coordinator deploys the remote notification helper pointed at this
    /// URL, and the daemon posts for jobs that die without a trace.
    pub webhook_url: Option<String>,
}

impl Config {
    /// Loads `config.yaml` from the `rj` config directory, falling back to
    /// defaults for any key the file omits. A missing file is treated the
    /// same as an empty one; a malformed file is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("rj");
        let state_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or(ConfigError::NoConfigDir)?
            .join("rj");

        let config_path = config_dir.join("config.yaml");
        let raw = read_raw(&config_path)?;

        Ok(Self {
            db_path: config_dir.join("jobs.db"),
            config_dir,
            lock_path: state_dir.join("rjd.lock"),
            default_command: raw.default_command,
            sync_interval: parse_or(raw.sync_interval, DEFAULT_SYNC_INTERVAL_SECS),
            log_refresh_interval: parse_or(raw.log_refresh_interval, DEFAULT_LOG_REFRESH_INTERVAL_SECS),
            host_refresh_interval: parse_or(raw.host_refresh_interval, DEFAULT_HOST_REFRESH_INTERVAL_SECS),
            webhook_url: raw.webhook_url,
        })
    }
}

fn read_raw(path: &Path) -> Result<RawConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(RawConfig::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_or(value: Option<String>, default_secs: u64) -> std::time::Duration {
    match value.as_deref().map(rj_engine::parse_duration) {
        Some(Ok(duration)) => duration,
        Some(Err(_)) | None => std::time::Duration::from_secs(default_secs),
    }
}
