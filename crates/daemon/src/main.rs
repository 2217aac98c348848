// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tyd`, the Trainyard orchestration daemon.

use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use ty_backend::{KubernetesBackend, LocalProcessBackend};
use ty_core::{Clock, SystemClock};
use ty_daemon::{lifecycle, router, serve, AppState, DaemonConfig, DaemonError};
use ty_engine::Supervisor;
use ty_store::{JobStore, LogStore};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("tyd: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), DaemonError> {
    let config_path = std::env::var_os("TY_CONFIG")
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from));
    let config = DaemonConfig::load(config_path.as_deref())?;

    let state_dir = config.state_dir();
    std::fs::create_dir_all(&state_dir)?;
    let _log_guard = init_tracing(&state_dir);
    let _lock = lifecycle::acquire_lock(&state_dir)?;

    let store = Arc::new(JobStore::open(&state_dir)?);
    let logs = Arc::new(LogStore::new(state_dir.join("logs")));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let orphans = lifecycle::reconcile_orphans(&store, clock.as_ref());
    if !orphans.is_empty() {
        tracing::warn!(count = orphans.len(), "reconciled orphaned jobs from previous run");
    }

    let mut builder = Supervisor::builder(Arc::clone(&store), logs, clock)
        .config(config.supervisor_config());
    if config.local.enabled {
        builder = builder.backend(Arc::new(LocalProcessBackend::new()));
    }
    if let Some(section) = &config.kubernetes {
        let backend = KubernetesBackend::new(section.to_backend_config()).await?;
        let known = store.non_terminal().iter().map(|r| r.id().clone()).collect();
        backend.cleanup_stale(&known).await;
        builder = builder.backend(Arc::new(backend));
    }
    let supervisor = builder.build();

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, state_dir = %state_dir.display(), "tyd listening");

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let state = AppState { supervisor, callback_base: config.callback_base() };
    serve(listener, router(state), shutdown).await?;
    tracing::info!("tyd shut down");
    Ok(())
}

fn init_tracing(state_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let appender = tracing_appender::rolling::daily(state_dir.join("logs"), "tyd.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = tracing_subscriber::EnvFilter::try_from_env("TY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    guard
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    shutdown.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => tracing::info!("received SIGINT"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        shutdown.cancel();
    });
}
