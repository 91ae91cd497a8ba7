// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rjd: background sync daemon.
//!
//! Acquires the single-writer lock, then alternates `Synchronizer` fast
//! syncs on `sync_interval` with full syncs on `host_refresh_interval`,
//! until a termination signal arrives.

use std::sync::Arc;

use rj_adapters::{NoOpNotifier, Notifier, WebhookNotifier};
use rj_daemon::config::Config;
use rj_daemon::lockfile;
use rj_engine::Synchronizer;
use rj_shell::OpenSshTransport;
use rj_storage::JobStore;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("rjd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("rjd {}", env!("CARGO_PKG_VERSION"));
                println!("Background sync daemon for the rj job control plane.");
                println!("Typically started alongside the `rj` CLI, not invoked directly.");
                return Ok(());
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("usage: rjd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load()?;
    std::fs::create_dir_all(&config.config_dir)?;

    let _lock = match lockfile::acquire(&config.lock_path) {
        Ok(lock) => lock,
        Err(lockfile::LockError::AlreadyRunning(path)) => {
            eprintln!("rjd is already running (lock held at {})", path.display());
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let store = Arc::new(JobStore::open(&config.db_path)?);
    let transport = Arc::new(OpenSshTransport::new("ssh", Vec::new()));
    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NoOpNotifier),
    };
    let synchronizer = Synchronizer::new(store, transport).with_notifier(notifier);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        sync_interval = ?config.sync_interval,
        host_refresh_interval = ?config.host_refresh_interval,
        "rjd ready"
    );
    println!("READY");

    let mut tick = tokio::time::interval(config.sync_interval);
    let mut elapsed_since_full = std::time::Duration::ZERO;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                elapsed_since_full += config.sync_interval;
                let full = elapsed_since_full >= config.host_refresh_interval;
                if full {
                    elapsed_since_full = std::time::Duration::ZERO;
                }
                if let Err(err) = synchronizer.sync_all_hosts(full).await {
                    error!(error = %err, "sync cycle failed");
                }
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    Ok(())
}
