// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router assembly and the serve loop.

use crate::routes;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use ty_engine::Supervisor;

/// Shared context for all request handlers.
pub struct AppState {
    pub supervisor: Supervisor,
    /// Base URL embedded in worker callback addresses
    pub callback_base: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/jobs", post(routes::jobs::submit))
        .route("/api/v1/jobs/{id}", get(routes::jobs::get_job))
        .route("/api/v1/jobs/{id}/cancel", post(routes::jobs::cancel_job))
        .route("/api/v1/jobs/{id}/logs", get(routes::jobs::job_logs))
        .route("/api/v1/jobs/{id}/events", get(routes::events::job_events))
        .route("/api/v1/sessions/{id}/jobs", get(routes::jobs::session_jobs))
        .route("/api/v1/sessions/{id}/events", get(routes::events::session_events))
        .route("/api/v1/callbacks/{id}/started", post(routes::callbacks::started))
        .route("/api/v1/callbacks/{id}/progress", post(routes::callbacks::progress))
        .route("/api/v1/callbacks/{id}/completion", post(routes::callbacks::completion))
        .with_state(Arc::new(state))
}

/// Serve until the shutdown token fires, then drain gracefully.
pub async fn serve(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
