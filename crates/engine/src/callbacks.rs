// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callback ingestion: validated application of worker reports.
//!
//! Every accepted message is durably committed to the store before the
//! caller sees success, then fanned out through the hub and mirrored to
//! the observability bridge. The worker treats a non-success response as
//! "retry this callback", so rejections are typed: definitive conflicts
//! (stale, terminal) versus store failures the worker should retry.

use crate::error::CallbackError;
use crate::supervisor::Supervisor;
use ty_core::{JobFailure, JobId, Progress, StreamOrigin};
use ty_protocol::{
    CallbackOutcome, CompletionCallback, ProgressCallback, StartedCallback, StreamEvent,
};

impl Supervisor {
    /// `started`: records the worker's run identifier and transitions to
    /// `running`. Retried deliveries are benign no-ops.
    pub async fn callback_started(
        &self,
        id: &JobId,
        callback: StartedCallback,
    ) -> Result<(), CallbackError> {
        match self.store.mark_running(id, callback.run_ref, self.now())? {
            Some(_) => {
                tracing::debug!(job_id = %id, "worker reported started");
                self.publish_record(id);
            }
            None => {
                tracing::debug!(job_id = %id, "duplicate started callback ignored");
            }
        }
        Ok(())
    }

    /// `progress`: applied only when newer than the last applied report;
    /// out-of-order and duplicate deliveries are rejected unapplied.
    pub async fn callback_progress(
        &self,
        id: &JobId,
        callback: ProgressCallback,
    ) -> Result<(), CallbackError> {
        let now = self.now();
        let progress = Progress {
            epoch: callback.epoch,
            step: callback.step,
            metrics: callback.metrics,
        };

        self.store.apply_progress(id, progress.clone(), callback.checkpoints, now)?;

        let Some(record) = self.store.get(id) else {
            return Err(CallbackError::UnknownJob(id.clone()));
        };
        let session = record.session().clone();

        self.hub.publish(
            id,
            &session,
            StreamEvent::Progress { id: id.clone(), progress: progress.clone() },
        );

        if let Some(excerpt) = callback.log_excerpt {
            let lines: Vec<String> = excerpt.lines().map(str::to_string).collect();
            let tagged = self.logs.append(id, StreamOrigin::Stdout, lines, now);
            if !tagged.is_empty() {
                self.hub.publish(
                    id,
                    &session,
                    StreamEvent::Log { id: id.clone(), lines: tagged },
                );
            }
        }

        self.tracker
            .record_metrics(id, progress.epoch, progress.step, &progress.metrics)
            .await;
        Ok(())
    }

    /// `completion`: drives the record to a terminal state. A completion
    /// arriving after another terminal determination (backend monitor,
    /// cancel) is accepted but does not override it — first terminal event
    /// wins and the discrepancy is logged.
    pub async fn callback_completion(
        &self,
        id: &JobId,
        callback: CompletionCallback,
    ) -> Result<(), CallbackError> {
        let now = self.now();
        let result = match callback.outcome {
            CallbackOutcome::Succeeded => {
                self.store.complete(id, callback.metrics, callback.checkpoints, now)
            }
            CallbackOutcome::Failed => {
                let failure = match callback.error {
                    Some(error) => JobFailure::worker_reported(error.message, error.detail),
                    None => JobFailure::worker_reported("worker reported failure", None),
                };
                self.store.fail(id, failure, now)
            }
        };

        match result {
            Ok(_) => {
                if let Some(diagnostics) = callback.diagnostics {
                    let lines: Vec<String> = diagnostics.lines().map(str::to_string).collect();
                    self.logs.append(id, StreamOrigin::Stderr, lines, now);
                }
                self.publish_record(id);
                if let Some(record) = self.store.get(id) {
                    tracing::info!(job_id = %id, status = %record.status, "worker reported completion");
                    self.tracker.finalize_run(id, record.status).await;
                }
                Ok(())
            }
            Err(ty_store::StoreError::Terminal { status, .. }) => {
                tracing::info!(
                    job_id = %id,
                    recorded = %status,
                    reported = ?callback.outcome,
                    "completion callback after terminal state, keeping first determination"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "callbacks_tests.rs"]
mod tests;
