// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Job Store: validated, version-guarded mutations over the WAL.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use ty_core::{
    CheckpointRef, JobDescriptor, JobEvent, JobFailure, JobId, JobRecord, JobStatus, Progress,
    SessionId,
};

/// Compact on open once the WAL has grown past this many entries.
const COMPACT_THRESHOLD: u64 = 4096;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job already exists: {0}")]
    Duplicate(JobId),

    #[error("job {id} is already terminal ({status})")]
    Terminal { id: JobId, status: JobStatus },

    #[error("job {id}: invalid transition {from} -> {to}")]
    InvalidTransition { id: JobId, from: JobStatus, to: JobStatus },

    #[error(
        "stale progress for {id}: received epoch/step {received:?}, already applied {applied:?}"
    )]
    Stale { id: JobId, received: (u64, u64), applied: (u64, u64) },

    #[error(transparent)]
    Wal(#[from] WalError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

struct Inner {
    state: MaterializedState,
    wal: Wal,
    snapshot_path: PathBuf,
}

impl Inner {
    /// Append the event to the WAL (durable before acknowledgement), then
    /// fold it into the materialized state.
    fn commit(&mut self, event: &JobEvent) -> Result<(), StoreError> {
        self.wal.append(event)?;
        self.state.apply(event);
        Ok(())
    }
}

/// Durable record of job descriptors and their current state.
///
/// All mutations serialize per-process through one lock; per-job staleness
/// is decided by the record's `version`/progress guard, so concurrent
/// delivery of a callback and a backend-monitor terminal event can never
/// interleave into a corrupt record; the loser gets a typed rejection.
pub struct JobStore {
    inner: Mutex<Inner>,
}

impl JobStore {
    /// Open (or create) the store under `state_dir`, replaying snapshot
    /// and WAL. Compacts on open when the WAL has grown large.
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        let snapshot_path = state_dir.join("snapshot.zst");
        let mut state = Snapshot::load(&snapshot_path)?.unwrap_or_default();

        let (wal, events) = Wal::open(state_dir.join("wal.jsonl"))?;
        for event in &events {
            state.apply(event);
        }

        let store = Self { inner: Mutex::new(Inner { state, wal, snapshot_path }) };
        if events.len() as u64 >= COMPACT_THRESHOLD {
            store.compact()?;
        }
        Ok(store)
    }

    /// Snapshot the current state and truncate the WAL.
    pub fn compact(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let snapshot_path = inner.snapshot_path.clone();
        Snapshot::save(&snapshot_path, &inner.state)?;
        inner.wal.truncate()?;
        tracing::info!(jobs = inner.state.jobs.len(), "compacted job store");
        Ok(())
    }

    /// Insert a new record in `pending`.
    pub fn create(&self, descriptor: JobDescriptor, at_ms: u64) -> Result<JobEvent, StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.jobs.contains_key(descriptor.id.as_str()) {
            return Err(StoreError::Duplicate(descriptor.id.clone()));
        }
        let event = JobEvent::Created { descriptor, created_at_ms: at_ms };
        inner.commit(&event)?;
        Ok(event)
    }

    /// `pending -> starting`: the backend accepted the start request.
    pub fn mark_starting(
        &self,
        id: &JobId,
        handle: &str,
        at_ms: u64,
    ) -> Result<JobEvent, StoreError> {
        let mut inner = self.inner.lock();
        let record = require(&inner.state, id)?;
        guard_transition(record, JobStatus::Starting)?;
        let event = JobEvent::Starting { id: id.clone(), handle: handle.to_string(), at_ms };
        inner.commit(&event)?;
        Ok(event)
    }

    /// `-> running`, from the first `started` callback or the backend
    /// monitor's liveness signal, whichever lands first. Re-delivery once
    /// running is a benign no-op (`Ok(None)`).
    pub fn mark_running(
        &self,
        id: &JobId,
        run_ref: Option<String>,
        at_ms: u64,
    ) -> Result<Option<JobEvent>, StoreError> {
        let mut inner = self.inner.lock();
        let record = require(&inner.state, id)?;
        if record.status == JobStatus::Running {
            return Ok(None);
        }
        guard_transition(record, JobStatus::Running)?;
        let event = JobEvent::Running { id: id.clone(), run_ref, at_ms };
        inner.commit(&event)?;
        Ok(Some(event))
    }

    /// Apply a progress report. Out-of-order or duplicate deliveries are
    /// rejected as `Stale` without mutating the record.
    pub fn apply_progress(
        &self,
        id: &JobId,
        progress: Progress,
        checkpoints: Vec<CheckpointRef>,
        at_ms: u64,
    ) -> Result<JobEvent, StoreError> {
        let mut inner = self.inner.lock();
        let record = require(&inner.state, id)?;
        if record.is_terminal() {
            return Err(StoreError::Terminal { id: id.clone(), status: record.status });
        }
        if let Some(current) = &record.progress {
            if !progress.newer_than(current) {
                return Err(StoreError::Stale {
                    id: id.clone(),
                    received: (progress.epoch, progress.step),
                    applied: (current.epoch, current.step),
                });
            }
        }
        let event = JobEvent::Progress { id: id.clone(), progress, checkpoints, at_ms };
        inner.commit(&event)?;
        Ok(event)
    }

    /// Terminal `completed`. Rejected with `Terminal` when another terminal
    /// determination already won.
    pub fn complete(
        &self,
        id: &JobId,
        metrics: HashMap<String, f64>,
        checkpoints: Vec<CheckpointRef>,
        at_ms: u64,
    ) -> Result<JobEvent, StoreError> {
        let mut inner = self.inner.lock();
        let record = require(&inner.state, id)?;
        guard_transition(record, JobStatus::Completed)?;
        let event = JobEvent::Completed { id: id.clone(), metrics, checkpoints, at_ms };
        inner.commit(&event)?;
        Ok(event)
    }

    /// Terminal `failed` with a structured reason.
    pub fn fail(
        &self,
        id: &JobId,
        failure: JobFailure,
        at_ms: u64,
    ) -> Result<JobEvent, StoreError> {
        let mut inner = self.inner.lock();
        let record = require(&inner.state, id)?;
        guard_transition(record, JobStatus::Failed)?;
        let event = JobEvent::Failed { id: id.clone(), failure, at_ms };
        inner.commit(&event)?;
        Ok(event)
    }

    /// Terminal `cancelled`, recorded on backend acknowledgement without
    /// waiting for the worker.
    pub fn cancel(&self, id: &JobId, at_ms: u64) -> Result<JobEvent, StoreError> {
        let mut inner = self.inner.lock();
        let record = require(&inner.state, id)?;
        guard_transition(record, JobStatus::Cancelled)?;
        let event = JobEvent::Cancelled { id: id.clone(), at_ms };
        inner.commit(&event)?;
        Ok(event)
    }

    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.inner.lock().state.jobs.get(id.as_str()).cloned()
    }

    pub fn jobs_for_session(&self, session: &SessionId) -> Vec<JobRecord> {
        let inner = self.inner.lock();
        inner.state.jobs.values().filter(|r| r.session() == session).cloned().collect()
    }

    /// Records that have not reached a terminal state. Used for restart
    /// reconciliation and stale-resource cleanup.
    pub fn non_terminal(&self) -> Vec<JobRecord> {
        let inner = self.inner.lock();
        inner.state.jobs.values().filter(|r| !r.is_terminal()).cloned().collect()
    }

    pub fn wal_entries(&self) -> u64 {
        self.inner.lock().wal.entries()
    }
}

fn require<'a>(state: &'a MaterializedState, id: &JobId) -> Result<&'a JobRecord, StoreError> {
    state.jobs.get(id.as_str()).ok_or_else(|| StoreError::NotFound(id.clone()))
}

fn guard_transition(record: &JobRecord, to: JobStatus) -> Result<(), StoreError> {
    if record.is_terminal() {
        return Err(StoreError::Terminal { id: record.id().clone(), status: record.status });
    }
    if !record.status.can_transition(to) {
        return Err(StoreError::InvalidTransition {
            id: record.id().clone(),
            from: record.status,
            to,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
