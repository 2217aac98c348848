// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized job state: the fold of all applied events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ty_core::{JobEvent, JobId, JobRecord, JobStatus};

/// In-memory view of every job record, reproducible by replaying the WAL.
///
/// `apply` is the only mutation path for records, shared between live
/// writes and replay. Guards here are defensive: the [`crate::JobStore`]
/// validates before appending, so an event that fails a guard during
/// replay is a historical no-op (e.g. a terminal event that lost the
/// first-terminal-wins race) and is skipped, not an error.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<JobId, JobRecord>,
}

impl MaterializedState {
    pub fn apply(&mut self, event: &JobEvent) {
        match event {
            JobEvent::Created { descriptor, created_at_ms } => {
                self.jobs
                    .entry(descriptor.id.clone())
                    .or_insert_with(|| JobRecord::new(descriptor.clone(), *created_at_ms));
            }

            JobEvent::Starting { id, handle, at_ms } => {
                if let Some(record) = self.transitionable(id, JobStatus::Starting) {
                    record.status = JobStatus::Starting;
                    record.backend_handle = Some(handle.clone());
                    record.bump(*at_ms);
                }
            }

            JobEvent::Running { id, run_ref, at_ms } => {
                if let Some(record) = self.transitionable(id, JobStatus::Running) {
                    record.status = JobStatus::Running;
                    if run_ref.is_some() {
                        record.run_ref.clone_from(run_ref);
                    }
                    record.bump(*at_ms);
                }
            }

            JobEvent::Progress { id, progress, checkpoints, at_ms } => {
                if let Some(record) = self.jobs.get_mut(id.as_str()) {
                    let newer = record
                        .progress
                        .as_ref()
                        .map_or(true, |current| progress.newer_than(current));
                    if !record.is_terminal() && newer {
                        record.progress = Some(progress.clone());
                        record.merge_checkpoints(checkpoints.clone());
                        record.bump(*at_ms);
                    }
                }
            }

            JobEvent::Completed { id, metrics, checkpoints, at_ms } => {
                if let Some(record) = self.transitionable(id, JobStatus::Completed) {
                    record.status = JobStatus::Completed;
                    if !metrics.is_empty() {
                        let progress = record.progress.get_or_insert_with(Default::default);
                        progress.metrics.extend(metrics.clone());
                    }
                    record.merge_checkpoints(checkpoints.clone());
                    record.bump(*at_ms);
                }
            }

            JobEvent::Failed { id, failure, at_ms } => {
                if let Some(record) = self.transitionable(id, JobStatus::Failed) {
                    record.status = JobStatus::Failed;
                    record.failure = Some(failure.clone());
                    record.bump(*at_ms);
                }
            }

            JobEvent::Cancelled { id, at_ms } => {
                if let Some(record) = self.transitionable(id, JobStatus::Cancelled) {
                    record.status = JobStatus::Cancelled;
                    record.bump(*at_ms);
                }
            }
        }
    }

    fn transitionable(&mut self, id: &JobId, to: JobStatus) -> Option<&mut JobRecord> {
        self.jobs.get_mut(id.as_str()).filter(|record| record.status.can_transition(to))
    }
}
