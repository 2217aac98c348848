// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query DTO mirroring the job record.

use serde::{Deserialize, Serialize};
use ty_core::{
    BackendKind, CheckpointRef, JobFailure, JobId, JobRecord, JobStatus, Progress, SessionId,
};

/// Current state of one job, as returned by the query surface and carried
/// on `record` stream events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub id: JobId,
    pub session: SessionId,
    pub backend: BackendKind,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checkpoints: Vec<CheckpointRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    pub version: u64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl From<&JobRecord> for JobDetail {
    fn from(record: &JobRecord) -> Self {
        Self {
            id: record.id().clone(),
            session: record.session().clone(),
            backend: record.backend(),
            status: record.status,
            progress: record.progress.clone(),
            checkpoints: record.checkpoints.clone(),
            backend_handle: record.backend_handle.clone(),
            run_ref: record.run_ref.clone(),
            failure: record.failure.clone(),
            version: record.version,
            created_at_ms: record.created_at_ms,
            updated_at_ms: record.updated_at_ms,
        }
    }
}
