// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Execution backends — pluggable strategies that run the isolated worker.
//!
//! Two implementations share one contract: a child process on the
//! orchestrator host ([`LocalProcessBackend`]) and a batch Job on a
//! Kubernetes cluster ([`KubernetesBackend`]). Both converge on the same
//! terminal-status shape so the supervisor never branches on which backend
//! is running a job.

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod kubernetes;
pub mod local;

pub use kubernetes::{KubernetesBackend, KubernetesConfig};
pub use local::LocalProcessBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use ty_core::{BackendKind, JobDescriptor, JobFailure, StreamOrigin};

/// Environment variable carrying the callback base address into the worker.
pub const CALLBACK_URL_ENV: &str = "TY_CALLBACK_URL";
/// Environment variable carrying the job id into the worker.
pub const JOB_ID_ENV: &str = "TY_JOB_ID";

/// Opaque address of a running unit of work: a pid for local processes,
/// a Job name on a cluster. Stored on the job record so cancellation and
/// reconciliation survive a daemon restart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendHandle(String);

impl BackendHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendHandle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Non-terminal observations pushed by [`ExecutionBackend::monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// The unit of work was observed actively executing. May be re-sent
    /// across monitor retries; the state machine dedups.
    Active,
}

/// The single terminal outcome of a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalStatus {
    Succeeded,
    Failed(JobFailure),
    Cancelled,
}

ty_core::simple_display! {
    TerminalStatus {
        Succeeded => "succeeded",
        Failed(..) => "failed",
        Cancelled => "cancelled",
    }
}

/// One line of worker output, tagged with its stream of origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub stream: StreamOrigin,
    pub line: String,
}

/// Line stream handed to the log collector.
pub type LogStream = mpsc::Receiver<LogChunk>;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The worker could not be started at all. Terminal for the job.
    #[error("launch failed: {0}")]
    LaunchFailed(String),

    /// The backend API could not be reached; the supervisor retries
    /// with bounded backoff.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("unknown backend handle: {0}")]
    UnknownHandle(String),

    /// The output stream was already handed out for this handle.
    #[error("output already attached for handle: {0}")]
    OutputTaken(String),
}

/// Contract every execution backend implements.
///
/// Object-safe: the daemon holds one `Arc<dyn ExecutionBackend>` per
/// configured kind and only the supervisor's selection step ever looks at
/// which one a job uses.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Begin the isolated worker. Safe to retry after a transient failure,
    /// but the supervisor never calls it twice after a success for the
    /// same job id.
    async fn start(&self, descriptor: &JobDescriptor) -> Result<BackendHandle, BackendError>;

    /// Wait for the unit of work to stop.
    ///
    /// Resolves with exactly one [`TerminalStatus`] — the authoritative
    /// "the work has stopped" signal, independent of whether the worker
    /// ever called back. Sends [`BackendEvent::Active`] on `events` when
    /// the work is first observed executing.
    async fn monitor(
        &self,
        handle: &BackendHandle,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<TerminalStatus, BackendError>;

    /// Best-effort stop request. Calling it on an already-terminated
    /// handle is a no-op, not an error.
    async fn cancel(&self, handle: &BackendHandle) -> Result<(), BackendError>;

    /// Attach to the execution's output. Yields lines until the work ends.
    async fn logs(&self, handle: &BackendHandle) -> Result<LogStream, BackendError>;
}
