// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;
use ty_backend::BackendError;
use ty_core::{BackendKind, JobId, JobStatus};
use ty_store::StoreError;

/// Errors from submission and cancellation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id} is already terminal ({status})")]
    Terminal { id: JobId, status: JobStatus },

    #[error("no backend registered for {0}")]
    UnsupportedBackend(BackendKind),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Typed rejections for worker callbacks.
///
/// The gateway maps these onto HTTP statuses: `UnknownJob` -> 404,
/// `Terminal`/`Stale` -> 409 (definitive, the worker must not retry),
/// `Store` -> 5xx (the worker should retry — the change was not durably
/// committed).
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("job not found: {0}")]
    UnknownJob(JobId),

    #[error("job {id} is already terminal ({status})")]
    Terminal { id: JobId, status: JobStatus },

    #[error(
        "stale progress for {id}: received epoch/step {received:?}, already applied {applied:?}"
    )]
    Stale { id: JobId, received: (u64, u64), applied: (u64, u64) },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CallbackError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => CallbackError::UnknownJob(id),
            StoreError::Terminal { id, status } => CallbackError::Terminal { id, status },
            StoreError::Stale { id, received, applied } => {
                CallbackError::Stale { id, received, applied }
            }
            other => CallbackError::Store(other),
        }
    }
}
