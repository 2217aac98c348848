// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and state machine.

use crate::descriptor::{BackendKind, JobDescriptor};
use crate::id::{JobId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a job.
///
/// Transitions only move forward: `pending -> starting -> running ->
/// {completed, failed}`, with `cancelled` reachable from any non-terminal
/// state. States may be skipped (a worker can die before it was ever
/// observed running) but never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Record created, backend not yet invoked
    Pending,
    /// Backend accepted the start request
    Starting,
    /// Worker observed executing (callback or backend monitor)
    Running,
    /// Terminal: work finished with success
    Completed,
    /// Terminal: work failed, `failure` holds the reason
    Failed,
    /// Terminal: explicit cancel request acknowledged by the backend
    Cancelled,
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Starting => "starting",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// Forward-only; once terminal nothing is permitted.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        match (self, to) {
            (Pending, Starting) | (Pending, Running) => true,
            (Starting, Running) => true,
            (Pending | Starting | Running, Completed | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

/// Last-known progress reported by the worker.
///
/// The metric map is schema-free — different training frameworks report
/// different metric names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub epoch: u64,
    #[serde(default)]
    pub step: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
}

impl Progress {
    /// Ordering guard for out-of-order callback delivery: a report is newer
    /// only if its (epoch, step) pair is strictly greater than `other`'s.
    /// Equal pairs are duplicate deliveries and must be discarded.
    pub fn newer_than(&self, other: &Progress) -> bool {
        (self.epoch, self.step) > (other.epoch, other.step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    Best,
    Last,
}

crate::simple_display! {
    CheckpointKind {
        Best => "best",
        Last => "last",
    }
}

/// Opaque reference to a checkpoint artifact.
///
/// References only — the upload path is an external collaborator concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRef {
    pub kind: CheckpointKind,
    pub uri: String,
}

/// Coarse classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Backend could not start the worker at all
    LaunchFailed,
    /// Backend monitor observed termination with no matching completion
    Crashed,
    /// Monitor itself kept erroring; the work's fate is unknown
    BackendUnreachable,
    /// The worker's own completion callback reported failure
    WorkerReported,
    /// Orchestrator restarted while the job was in flight
    Restart,
}

crate::simple_display! {
    FailureKind {
        LaunchFailed => "launch_failed",
        Crashed => "crashed",
        BackendUnreachable => "backend_unreachable",
        WorkerReported => "worker_reported",
        Restart => "restart",
    }
}

/// Structured terminal failure reason.
///
/// Every failure path maps to one of these — a record never carries a raw
/// unhandled fault. `detail` holds backend specifics (exit code, scheduler
/// condition) when available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JobFailure {
    pub fn launch_failed(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::LaunchFailed,
            reason: "launch failed".to_string(),
            detail: Some(detail.into()),
        }
    }

    pub fn crashed(reason: impl Into<String>, detail: Option<String>) -> Self {
        Self { kind: FailureKind::Crashed, reason: reason.into(), detail }
    }

    pub fn backend_unreachable(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::BackendUnreachable,
            reason: "status unknown — backend unreachable".to_string(),
            detail: Some(detail.into()),
        }
    }

    pub fn worker_reported(reason: impl Into<String>, detail: Option<String>) -> Self {
        Self { kind: FailureKind::WorkerReported, reason: reason.into(), detail }
    }

    pub fn restart() -> Self {
        Self {
            kind: FailureKind::Restart,
            reason: "orchestrator restarted while job was in flight".to_string(),
            detail: None,
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({})", self.reason, detail),
            None => f.write_str(&self.reason),
        }
    }
}

/// Mutable, authoritative state of one job. Owned exclusively by the Job
/// Store; everything else observes it through queries or broadcast events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// The immutable submission input, retained verbatim
    pub descriptor: JobDescriptor,
    pub status: JobStatus,
    /// Last-applied progress; `None` until the first report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checkpoints: Vec<CheckpointRef>,
    /// Opaque address the backend uses for the running unit (pid, Job name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_handle: Option<String>,
    /// The worker's own run identifier, for observability-backend linkage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_ref: Option<String>,
    /// Populated only on `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    /// Incremented on every mutation; stale callback effects are discarded
    /// by comparing against it
    pub version: u64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl JobRecord {
    pub fn new(descriptor: JobDescriptor, created_at_ms: u64) -> Self {
        Self {
            descriptor,
            status: JobStatus::Pending,
            progress: None,
            checkpoints: Vec::new(),
            backend_handle: None,
            run_ref: None,
            failure: None,
            version: 0,
            created_at_ms,
            updated_at_ms: created_at_ms,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.descriptor.id
    }

    pub fn session(&self) -> &SessionId {
        &self.descriptor.session
    }

    pub fn backend(&self) -> BackendKind {
        self.descriptor.backend
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record one applied mutation: bump the version and touch the
    /// update timestamp. Callers mutate fields first, then bump.
    pub fn bump(&mut self, at_ms: u64) {
        self.version += 1;
        self.updated_at_ms = at_ms;
    }

    /// Merge a checkpoint report: same-kind references are replaced
    /// (a newer "best" supersedes the old one), new kinds appended.
    pub fn merge_checkpoints(&mut self, refs: Vec<CheckpointRef>) {
        for incoming in refs {
            match self.checkpoints.iter_mut().find(|c| c.kind == incoming.kind) {
                Some(existing) => *existing = incoming,
                None => self.checkpoints.push(incoming),
            }
        }
    }
}

crate::builder! {
    pub struct JobRecordBuilder => JobRecord {
        set {
            descriptor: JobDescriptor = crate::test_support::descriptor(),
            status: JobStatus = JobStatus::Pending,
            checkpoints: Vec<CheckpointRef> = Vec::new(),
            version: u64 = 0,
            created_at_ms: u64 = 1_000_000,
            updated_at_ms: u64 = 1_000_000,
        }
        option {
            progress: Progress,
            backend_handle: String,
            run_ref: String,
            failure: JobFailure,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
