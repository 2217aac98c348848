// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job supervisor — one owning task per job, from start to terminal state.

use crate::collector::{CollectorConfig, LogCollector, LogForwarder, NoopForwarder};
use crate::error::EngineError;
use crate::hub::BroadcastHub;
use crate::tracker::{NoopTracker, TrackerBridge};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use ty_backend::{BackendEvent, BackendHandle, ExecutionBackend, TerminalStatus};
use ty_core::{BackendKind, Clock, JobDescriptor, JobFailure, JobId, JobRecord, JobStatus};
use ty_protocol::{JobDetail, StreamEvent};
use ty_store::{JobStore, LogStore, StoreError};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Consecutive monitor errors tolerated before the job is failed
    /// with "status unknown"
    pub monitor_attempts: u32,
    /// Base backoff between monitor retries (doubles per attempt)
    pub monitor_backoff: Duration,
    pub collector: CollectorConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            monitor_attempts: 5,
            monitor_backoff: Duration::from_secs(2),
            collector: CollectorConfig::default(),
        }
    }
}

/// Ties store, backends, hub and collector together.
///
/// Owns exactly one task per job, spawned at submission, which exits only
/// once the record is terminal — the backend monitor alone is sufficient
/// to get there, so a job can never be stuck waiting for a callback that
/// will never come.
#[derive(Clone)]
pub struct Supervisor {
    pub(crate) store: Arc<JobStore>,
    pub(crate) logs: Arc<LogStore>,
    pub(crate) hub: BroadcastHub,
    backends: Arc<HashMap<BackendKind, Arc<dyn ExecutionBackend>>>,
    pub(crate) tracker: Arc<dyn TrackerBridge>,
    forwarder: Arc<dyn LogForwarder>,
    clock: Arc<dyn Clock>,
    config: SupervisorConfig,
}

pub struct SupervisorBuilder {
    store: Arc<JobStore>,
    logs: Arc<LogStore>,
    clock: Arc<dyn Clock>,
    backends: HashMap<BackendKind, Arc<dyn ExecutionBackend>>,
    tracker: Arc<dyn TrackerBridge>,
    forwarder: Arc<dyn LogForwarder>,
    config: SupervisorConfig,
}

impl SupervisorBuilder {
    pub fn backend(mut self, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    pub fn tracker(mut self, tracker: Arc<dyn TrackerBridge>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn forwarder(mut self, forwarder: Arc<dyn LogForwarder>) -> Self {
        self.forwarder = forwarder;
        self
    }

    pub fn config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Supervisor {
        Supervisor {
            store: self.store,
            logs: self.logs,
            hub: BroadcastHub::new(),
            backends: Arc::new(self.backends),
            tracker: self.tracker,
            forwarder: self.forwarder,
            clock: self.clock,
            config: self.config,
        }
    }
}

impl Supervisor {
    pub fn builder(
        store: Arc<JobStore>,
        logs: Arc<LogStore>,
        clock: Arc<dyn Clock>,
    ) -> SupervisorBuilder {
        SupervisorBuilder {
            store,
            logs,
            clock,
            backends: HashMap::new(),
            tracker: Arc::new(NoopTracker),
            forwarder: Arc::new(NoopForwarder),
            config: SupervisorConfig::default(),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn logs(&self) -> &Arc<LogStore> {
        &self.logs
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub(crate) fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    fn backend_for(&self, kind: BackendKind) -> Result<Arc<dyn ExecutionBackend>, EngineError> {
        self.backends.get(&kind).cloned().ok_or(EngineError::UnsupportedBackend(kind))
    }

    /// Accept a descriptor: create the record in `pending` and start the
    /// per-job task. Returns the job id immediately.
    pub fn submit(&self, descriptor: JobDescriptor) -> Result<JobId, EngineError> {
        let backend = self.backend_for(descriptor.backend)?;
        let id = descriptor.id.clone();

        self.store.create(descriptor.clone(), self.now())?;
        tracing::info!(job_id = %id, backend = %descriptor.backend, "job submitted");
        self.publish_record(&id);

        let supervisor = self.clone();
        tokio::spawn(async move {
            supervisor.run_job(backend, descriptor).await;
        });
        Ok(id)
    }

    /// Explicit cancel: best-effort stop at the backend, recorded as
    /// `cancelled` immediately on acknowledgement, without waiting for
    /// whatever the worker later reports.
    pub async fn cancel(&self, id: &JobId) -> Result<JobRecord, EngineError> {
        let record = self.store.get(id).ok_or_else(|| EngineError::NotFound(id.clone()))?;
        if record.is_terminal() {
            return Err(EngineError::Terminal { id: id.clone(), status: record.status });
        }

        if let Some(handle) = &record.backend_handle {
            let backend = self.backend_for(record.backend())?;
            backend.cancel(&BackendHandle::new(handle.clone())).await?;
        }

        match self.store.cancel(id, self.now()) {
            Ok(_) => {
                tracing::info!(job_id = %id, "job cancelled");
                self.publish_record(id);
                self.tracker.finalize_run(id, JobStatus::Cancelled).await;
            }
            // A terminal event beat the cancel acknowledgement; keep it
            Err(StoreError::Terminal { status, .. }) => {
                tracing::info!(job_id = %id, %status, "cancel lost the race to a terminal event");
            }
            Err(e) => return Err(e.into()),
        }
        self.store.get(id).ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    /// The per-job supervisor task.
    async fn run_job(self, backend: Arc<dyn ExecutionBackend>, descriptor: JobDescriptor) {
        let id = descriptor.id.clone();

        let handle = match backend.start(&descriptor).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "worker launch failed");
                self.finish_failed(&id, JobFailure::launch_failed(e.to_string())).await;
                return;
            }
        };

        match self.store.mark_starting(&id, handle.as_str(), self.now()) {
            Ok(_) => self.publish_record(&id),
            Err(StoreError::Terminal { status, .. }) => {
                // Cancelled while the launch was in flight: stop the unit
                // we just started and let the record stand
                tracing::info!(job_id = %id, %status, "job terminal before start completed");
                let _ = backend.cancel(&handle).await;
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "failed to record start");
            }
        }

        // Log capture runs concurrently for the life of the execution
        match backend.logs(&handle).await {
            Ok(stream) => {
                let collector = LogCollector::new(
                    Arc::clone(&self.logs),
                    self.hub.clone(),
                    Arc::clone(&self.forwarder),
                    self.config.collector.clone(),
                    Arc::clone(&self.clock),
                );
                let job = id.clone();
                let session = descriptor.session.clone();
                tokio::spawn(async move {
                    collector.run(&job, &session, stream).await;
                });
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "could not attach log collector");
            }
        }

        match self.monitor_with_retry(backend.as_ref(), &id, &handle).await {
            Ok(terminal) => self.reconcile_terminal(&id, terminal).await,
            Err(e) => {
                self.finish_failed(&id, JobFailure::backend_unreachable(e.to_string())).await;
            }
        }
    }

    /// Wait on the backend monitor, retrying transient errors with
    /// exponential backoff up to the configured attempt bound.
    async fn monitor_with_retry(
        &self,
        backend: &dyn ExecutionBackend,
        id: &JobId,
        handle: &BackendHandle,
    ) -> Result<TerminalStatus, ty_backend::BackendError> {
        let mut attempt: u32 = 0;
        loop {
            let (tx, mut rx) = mpsc::channel(4);
            let monitor = backend.monitor(handle, tx);
            tokio::pin!(monitor);

            let result = loop {
                tokio::select! {
                    result = &mut monitor => break result,
                    Some(event) = rx.recv() => match event {
                        BackendEvent::Active => self.note_running(id),
                    },
                }
            };

            match result {
                Ok(terminal) => return Ok(terminal),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.config.monitor_attempts {
                        tracing::error!(
                            job_id = %id,
                            error = %e,
                            attempts = attempt,
                            "backend monitor attempts exhausted"
                        );
                        return Err(e);
                    }
                    let backoff =
                        self.config.monitor_backoff * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        job_id = %id,
                        error = %e,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "backend monitor error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Liveness observed by the backend: `starting -> running` must not
    /// require the worker's callback.
    fn note_running(&self, id: &JobId) {
        match self.store.mark_running(id, None, self.now()) {
            Ok(Some(_)) => self.publish_record(id),
            Ok(None) => {}
            Err(e) => tracing::debug!(job_id = %id, error = %e, "liveness signal not applied"),
        }
    }

    /// Record the monitor's terminal determination, unless a callback (or
    /// a cancel request) already recorded one. First terminal event wins.
    async fn reconcile_terminal(&self, id: &JobId, terminal: TerminalStatus) {
        let now = self.now();
        let result = match &terminal {
            TerminalStatus::Succeeded => self.store.complete(id, HashMap::new(), Vec::new(), now),
            TerminalStatus::Failed(failure) => self.store.fail(id, failure.clone(), now),
            TerminalStatus::Cancelled => self.store.cancel(id, now),
        };

        match result {
            Ok(_) => {
                self.publish_record(id);
                if let Some(record) = self.store.get(id) {
                    tracing::info!(job_id = %id, status = %record.status, "job finished");
                    self.tracker.finalize_run(id, record.status).await;
                }
            }
            Err(StoreError::Terminal { status, .. }) => {
                tracing::info!(
                    job_id = %id,
                    recorded = %status,
                    monitor = %terminal,
                    "terminal state already recorded, keeping first determination"
                );
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "failed to record terminal state");
            }
        }
    }

    async fn finish_failed(&self, id: &JobId, failure: JobFailure) {
        match self.store.fail(id, failure, self.now()) {
            Ok(_) => {
                self.publish_record(id);
                self.tracker.finalize_run(id, JobStatus::Failed).await;
            }
            Err(StoreError::Terminal { status, .. }) => {
                tracing::debug!(job_id = %id, %status, "failure superseded by earlier terminal state");
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "failed to record failure");
            }
        }
    }

    /// Push the current record to job and session subscribers.
    pub(crate) fn publish_record(&self, id: &JobId) {
        if let Some(record) = self.store.get(id) {
            let event = StreamEvent::Record { detail: JobDetail::from(&record) };
            self.hub.publish(record.id(), record.session(), event);
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
