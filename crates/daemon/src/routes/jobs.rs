// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission and query surface.

use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use ty_core::{JobId, LogLine, SessionId};
use ty_protocol::{JobDetail, SubmitJobRequest, SubmitJobResponse};

/// Accept a descriptor; the supervisor starts asynchronously and the job
/// id is returned immediately.
pub(crate) async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<Json<SubmitJobResponse>, ApiError> {
    let descriptor = request.into_descriptor(&state.callback_base);
    let job_id = state.supervisor.submit(descriptor)?;
    Ok(Json(SubmitJobResponse { job_id }))
}

pub(crate) async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobDetail>, ApiError> {
    let id = JobId::from_string(id);
    let record = state.supervisor.store().get(&id).ok_or(ApiError::NotFound(id))?;
    Ok(Json(JobDetail::from(&record)))
}

pub(crate) async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobDetail>, ApiError> {
    let id = JobId::from_string(id);
    let record = state.supervisor.cancel(&id).await?;
    Ok(Json(JobDetail::from(&record)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogsQuery {
    tail: Option<usize>,
}

pub(crate) async fn job_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogLine>>, ApiError> {
    let id = JobId::from_string(id);
    if state.supervisor.store().get(&id).is_none() {
        return Err(ApiError::NotFound(id));
    }
    let lines = match query.tail {
        Some(n) => state.supervisor.logs().tail(&id, n),
        None => state.supervisor.logs().read(&id),
    }
    .map_err(|e| ApiError::Internal(format!("log read: {e}")))?;
    Ok(Json(lines))
}

pub(crate) async fn session_jobs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Vec<JobDetail>> {
    let session = SessionId::from_string(id);
    let mut details: Vec<JobDetail> = state
        .supervisor
        .store()
        .jobs_for_session(&session)
        .iter()
        .map(JobDetail::from)
        .collect();
    details.sort_by_key(|d| d.created_at_ms);
    Json(details)
}
