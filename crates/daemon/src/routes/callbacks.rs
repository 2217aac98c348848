// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callback gateway: the surface the isolated worker reports to.
//!
//! A 2xx is only returned after the store durably committed the change;
//! the worker retries anything else except the definitive 404/409.

use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use ty_core::JobId;
use ty_protocol::{CompletionCallback, ProgressCallback, StartedCallback};

pub(crate) async fn started(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(callback): Json<StartedCallback>,
) -> Result<StatusCode, ApiError> {
    let id = JobId::from_string(id);
    state.supervisor.callback_started(&id, callback).await?;
    Ok(StatusCode::OK)
}

pub(crate) async fn progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(callback): Json<ProgressCallback>,
) -> Result<StatusCode, ApiError> {
    let id = JobId::from_string(id);
    state.supervisor.callback_progress(&id, callback).await?;
    Ok(StatusCode::OK)
}

pub(crate) async fn completion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(callback): Json<CompletionCallback>,
) -> Result<StatusCode, ApiError> {
    let id = JobId::from_string(id);
    state.supervisor.callback_completion(&id, callback).await?;
    Ok(StatusCode::OK)
}
