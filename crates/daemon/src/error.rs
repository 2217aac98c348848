// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::path::PathBuf;
use thiserror::Error;
use ty_backend::BackendError;
use ty_engine::{CallbackError, EngineError};
use ty_store::StoreError;

/// Fatal startup/runtime errors for the `tyd` process.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("another tyd instance holds the lock at {0}")]
    AlreadyRunning(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Request-level errors, mapped onto HTTP statuses.
///
/// Workers treat any non-2xx as "retry this callback", except 404/409
/// which are definitive: the job is unknown, or the message lost a race
/// it can never win again.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Callback(#[from] CallbackError),

    #[error("job not found: {0}")]
    NotFound(ty_core::JobId),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_)
            | ApiError::Engine(EngineError::NotFound(_))
            | ApiError::Callback(CallbackError::UnknownJob(_)) => StatusCode::NOT_FOUND,

            ApiError::Engine(EngineError::Terminal { .. })
            | ApiError::Engine(EngineError::Store(StoreError::Duplicate(_)))
            | ApiError::Callback(CallbackError::Terminal { .. })
            | ApiError::Callback(CallbackError::Stale { .. }) => StatusCode::CONFLICT,

            ApiError::Engine(EngineError::UnsupportedBackend(_)) => StatusCode::BAD_REQUEST,

            ApiError::Engine(_) | ApiError::Callback(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
