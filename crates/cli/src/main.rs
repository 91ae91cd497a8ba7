// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rj - Remote Job Control Plane CLI.
//!
//! A thin command surface over `rj-engine`/`rj-storage`: every subcommand
//! opens the store and transport directly and calls straight into the
//! coordinator, synchronizer, or plan scheduler. CLI ergonomics are not the
//! fidelity target here; exercising the engine end-to-end from a real
//! binary is.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use rj_core::id::JobId;
use rj_core::job::JobStatus;
use rj_daemon::Config;
use rj_engine::{run_plan, watch, Coordinator, PlanFile, Synchronizer};
use rj_shell::{Deadline, OpenSshTransport, Transport};
use rj_storage::{JobFilter, JobStore, PruneOptions};

#[derive(Parser)]
#[command(name = "rj", version, about = "Remote Job Control Plane")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a job immediately on a remote host.
    Start {
        host: String,
        #[arg(long, default_value = "~")]
        dir: String,
        /// Shell command to run; falls back to `default_command` from
        /// config.yaml when omitted.
        command: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "env", value_parser = parse_key_value)]
        env: Vec<(String, String)>,
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        queue_on_fail: bool,
    },
    /// Append a job to a named queue instead of launching it directly.
    Queue {
        host: String,
        #[arg(long, default_value = "~")]
        dir: String,
        command: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "default")]
        queue: String,
        #[arg(long = "env", value_parser = parse_key_value)]
        env: Vec<(String, String)>,
        #[arg(long)]
        after: Option<i64>,
        #[arg(long)]
        after_any: bool,
    },
    /// Kill a job's remote session and mark it dead.
    Kill { id: i64 },
    /// Kill then relaunch a job with the same host/command.
    Restart { id: i64 },
    /// Update a job's description.
    Describe { id: i64, description: String },
    /// Move a still-queued job to a different host's queue.
    Move { id: i64, host: String },
    /// List jobs, or report one job's outcome through the exit code.
    ///
    /// The single-job form exits 0 for completed-with-zero, 1 for
    /// completed-nonzero/dead/failed, 2 for still running or queued, and
    /// 3 when no such job exists.
    Status {
        id: Option<i64>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Full-text search over job commands/descriptions.
    Search { query: String },
    /// Delete terminal job records older than the given duration.
    Prune {
        #[arg(long)]
        older_than: Option<String>,
        #[arg(long)]
        dead_too: bool,
    },
    /// Reconcile the store with remote reality for every active host.
    Sync {
        #[arg(long)]
        full: bool,
    },
    /// Run a multi-job plan file.
    Plan {
        file: std::path::PathBuf,
        #[arg(long)]
        watch: bool,
        #[arg(long, default_value = "10m")]
        timeout: String,
    },
    /// Tail a job's remote log file.
    Logs {
        id: i64,
        #[arg(long, short)]
        follow: bool,
        #[arg(long, short = 'n', default_value_t = 50)]
        lines: u32,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading rj config")?;
    std::fs::create_dir_all(&config.config_dir)?;
    let store = Arc::new(JobStore::open(&config.db_path).context("opening job store")?);
    let transport: Arc<dyn Transport> = Arc::new(OpenSshTransport::new("ssh", Vec::new()));
    let coordinator = Coordinator::new(store.clone(), transport.clone(), config.webhook_url.clone());
    let synchronizer = Synchronizer::new(store.clone(), transport.clone());

    match cli.command {
        Commands::Start {
            host,
            dir,
            command,
            description,
            env,
            timeout,
            queue_on_fail,
        } => {
            let command = command
                .or_else(|| config.default_command.clone())
                .ok_or_else(|| anyhow!("no command given and no default_command configured"))?;
            let outcome = coordinator
                .start_job(
                    &host,
                    &dir,
                    &command,
                    description.as_deref(),
                    env,
                    timeout,
                    queue_on_fail,
                )
                .await?;
            if outcome.queued_on_failure {
                println!("job {} queued (host unreachable)", outcome.job_id);
            } else {
                println!("job {} started", outcome.job_id);
            }
        }
        Commands::Queue {
            host,
            dir,
            command,
            description,
            queue,
            env,
            after,
            after_any,
        } => {
            let after_job = after.map(JobId::new);
            let id = coordinator
                .queue_job(&host, &dir, &command, description.as_deref(), &queue, env, after_job, after_any)
                .await?;
            coordinator.ensure_queue_runner_started(&host, &queue).await?;
            println!("job {id} queued on {host}/{queue}");
        }
        Commands::Kill { id } => {
            coordinator.kill_job(JobId::new(id)).await?;
            println!("job {id} killed");
        }
        Commands::Restart { id } => {
            let new_id = coordinator.restart_job(JobId::new(id)).await?;
            println!("job {id} restarted as {new_id}");
        }
        Commands::Describe { id, description } => {
            coordinator.describe(JobId::new(id), &description).await?;
            println!("job {id} updated");
        }
        Commands::Move { id, host } => {
            coordinator.move_queued(JobId::new(id), &host).await?;
            println!("job {id} moved to {host}");
        }
        Commands::Status { id: Some(id), .. } => {
            let Some(job) = store.get_job(JobId::new(id))? else {
                eprintln!("job {id} not found");
                std::process::exit(3);
            };
            println!(
                "{}\t{}\t{}\t{}\t{}",
                job.id,
                job.status,
                job.host,
                job.exit_code.map(|c| c.to_string()).unwrap_or_default(),
                job.command
            );
            let code = match rj_engine::classify(&job) {
                rj_engine::JobClassification::Succeeded => 0,
                rj_engine::JobClassification::Failed => 1,
                rj_engine::JobClassification::Queued | rj_engine::JobClassification::Running => 2,
            };
            std::process::exit(code);
        }
        Commands::Status { id: None, host, status } => {
            let status = status.map(|s| s.parse::<JobStatus>()).transpose().map_err(|e| anyhow!(e))?;
            let filter = JobFilter { status, host };
            for job in store.list_jobs(&filter, 500)? {
                println!("{}\t{}\t{}\t{}", job.id, job.status, job.host, job.command);
            }
        }
        Commands::Search { query } => {
            for job in store.search(&query, 500)? {
                println!("{}\t{}\t{}\t{}", job.id, job.status, job.host, job.command);
            }
        }
        Commands::Prune { older_than, dead_too } => {
            let cutoff = older_than
                .as_deref()
                .map(rj_engine::parse_duration)
                .transpose()
                .map_err(|e| anyhow!(e))?
                .map(|d| rj_core::time::now_epoch_secs() - d.as_secs() as i64);
            let pruned = store.prune(PruneOptions { dead_too, older_than: cutoff })?;
            println!("pruned {pruned} job(s)");
        }
        Commands::Sync { full } => {
            synchronizer.sync_all_hosts(full).await?;
            println!("sync complete");
        }
        Commands::Plan { file, watch: watch_flag, timeout } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading plan file {}", file.display()))?;
            let plan = PlanFile::from_yaml_str(&text)?;
            let ids = run_plan(&coordinator, &plan, true).await?;
            println!("scheduled {} job(s)", ids.len());
            if watch_flag {
                let deadline = rj_engine::parse_duration(&timeout).map_err(|e| anyhow!(e))?;
                let outcomes = watch(&store, &synchronizer, &ids, deadline).await?;
                for id in &ids {
                    let outcome = outcomes
                        .get(id)
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!("{id}\t{outcome}");
                }
            }
        }
        Commands::Logs { id, follow, lines } => {
            let job = store
                .get_job(JobId::new(id))?
                .ok_or_else(|| anyhow!("job {id} not found"))?;
            let paths = rj_core::paths::job_paths(&job);
            loop {
                // Runner-launched jobs stamp their artifacts with the
                // runner's own launch time, so fall back to the id-keyed
                // glob when the computed path reads nothing.
                let mut text = match transport
                    .read_remote_file(&job.host, &paths.log, Deadline::SYNC_FULL)
                    .await
                {
                    Ok(text) => text,
                    Err(_) => transport
                        .read_remote_file(
                            &job.host,
                            &rj_core::paths::log_file_glob(job.id),
                            Deadline::SYNC_FULL,
                        )
                        .await
                        .unwrap_or_default(),
                };
                if text.is_empty() {
                    // No log file at all (e.g. a legacy record): show the
                    // live pane instead.
                    text = transport
                        .capture_terminal_output(
                            &job.host,
                            &job.session_name(),
                            lines,
                            Deadline::SYNC_FULL,
                        )
                        .await
                        .unwrap_or_default();
                }
                let tail: Vec<&str> = text.lines().rev().take(lines as usize).collect();
                for line in tail.into_iter().rev() {
                    println!("{line}");
                }
                if !follow {
                    break;
                }
                let still_running = store
                    .get_job(JobId::new(id))?
                    .is_some_and(|j| !j.status.is_terminal());
                if !still_running {
                    break;
                }
                tokio::time::sleep(config.log_refresh_interval).await;
            }
        }
    }

    Ok(())
}
