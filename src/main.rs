#![forbid(unsafe_code)]

//! `sessionherd` — multi-session orchestrator binary.
//!
//! Loads configuration and the credential/proxy input files, spawns one
//! session agent per account pair under launch admission control, and runs
//! until every session is terminal or a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use sessionherd::config::GlobalConfig;
use sessionherd::driver::process_driver::ProcessDriver;
use sessionherd::inputs;
use sessionherd::orchestrator::{reporter, Orchestrator, RunSettings};
use sessionherd::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "sessionherd", about = "Multi-session orchestrator", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Override the credentials file from the config.
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Override the proxies file from the config.
    #[arg(long)]
    proxies: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("sessionherd bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(path) = args.credentials {
        config.credentials_path = path;
    }
    if let Some(path) = args.proxies {
        config.proxies_path = path;
    }
    info!("configuration loaded");

    // ── Load and pair inputs ────────────────────────────
    let credentials = inputs::load_credentials(&config.credentials_path)?;
    let proxies = inputs::load_proxies(&config.proxies_path)?;
    inputs::check_pairing(&credentials, &proxies)?;

    // ── Start the fleet ─────────────────────────────────
    let settings = RunSettings::from(&config);
    let driver = Arc::new(ProcessDriver::new(config.driver.clone()));
    let mut handle = Orchestrator::start(credentials, proxies, &settings, driver)?;

    let reporter_task = reporter::spawn_status_reporter(
        handle.statuses(),
        Duration::from_secs(config.orchestrator.status_interval_seconds),
        handle.cancel_token(),
    );
    info!(run_id = %handle.run_id(), "fleet running");

    // ── Run until done or signalled ─────────────────────
    let cancel = handle.cancel_token();
    let finished = tokio::select! {
        () = shutdown_signal() => None,
        summary = handle.wait() => Some(summary),
    };
    let summary = match finished {
        Some(summary) => {
            // Natural completion: stop the status reporter too.
            cancel.cancel();
            summary
        }
        None => {
            info!("shutdown signal received");
            let deadline = Duration::from_secs(config.orchestrator.shutdown_deadline_seconds);
            handle.shutdown(deadline).await
        }
    };

    let _ = reporter_task.await;
    reporter::log_summary(&summary);
    info!("sessionherd shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
