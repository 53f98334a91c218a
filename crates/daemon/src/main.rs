// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! roostd entrypoint: logging, configuration, runtime client and the
//! process-wide registry. The HTTP gateway and SFTP surfaces attach to
//! the registry and installer built here.

use roost_daemon::{DaemonConfig, Installer, ServerManager};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Config(#[from] roost_daemon::config::ConfigError),

    #[error("container runtime unavailable: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error(transparent)]
    Remote(#[from] roost_daemon::remote::RemoteError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "daemon failed");
            eprintln!("roostd: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), DaemonError> {
    let config = Arc::new(DaemonConfig::load(&DaemonConfig::path())?);
    let _log_guard = init_tracing(&config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting roostd");

    let docker = bollard::Docker::connect_with_local_defaults()?;
    let panel = Arc::new(roost_daemon::remote::PanelClient::new(
        config.panel.url.clone(),
        config.panel.token.clone(),
    )?);
    let manager = Arc::new(ServerManager::new());
    let _installer = Installer::new(
        docker.clone(),
        Arc::clone(&panel),
        Arc::clone(&manager),
        Arc::clone(&config),
    );

    info!(
        data_root = %config.system.data_root.display(),
        "daemon ready, waiting for shutdown signal"
    );
    tokio::signal::ctrl_c().await?;

    info!(servers = manager.len(), "shutting down");
    Ok(())
}

/// File logging with env-filter control; the returned guard flushes the
/// non-blocking writer on shutdown.
fn init_tracing(
    config: &DaemonConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    let log_dir = config.system.data_root.join("../logs");
    std::fs::create_dir_all(&log_dir)?;
    let appender = tracing_appender::rolling::daily(&log_dir, "roostd.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
