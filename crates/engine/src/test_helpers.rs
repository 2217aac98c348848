// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::collector::CollectorConfig;
use crate::supervisor::{Supervisor, SupervisorConfig};
use crate::tracker::TrackerBridge;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use ty_backend::fake::FakeBackend;
use ty_core::{FakeClock, JobId, JobRecord, JobStatus};
use ty_store::{JobStore, LogStore};

pub(crate) struct TestContext {
    pub supervisor: Supervisor,
    pub fake: FakeBackend,
    pub tracker: Arc<RecordingTracker>,
    _dir: tempfile::TempDir,
}

pub(crate) fn setup() -> TestContext {
    setup_with(FakeBackend::new())
}

pub(crate) fn setup_with(fake: FakeBackend) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JobStore::open(dir.path()).unwrap());
    let logs = Arc::new(LogStore::new(dir.path().join("logs")));
    let tracker = Arc::new(RecordingTracker::default());

    let supervisor = Supervisor::builder(store, logs, Arc::new(FakeClock::new()))
        .backend(Arc::new(fake.clone()))
        .tracker(tracker.clone())
        .config(SupervisorConfig {
            monitor_attempts: 3,
            monitor_backoff: Duration::from_millis(5),
            collector: CollectorConfig {
                batch_size: 4,
                flush_interval: Duration::from_millis(20),
                forward_attempts: 2,
            },
        })
        .build();

    TestContext { supervisor, fake, tracker, _dir: dir }
}

/// Poll the store until the job reaches `status`.
pub(crate) async fn wait_for_status(
    supervisor: &Supervisor,
    id: &JobId,
    status: JobStatus,
) -> JobRecord {
    for _ in 0..300 {
        if let Some(record) = supervisor.store().get(id) {
            if record.status == status {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never reached {}", id, status);
}

/// Tracker double recording every bridge invocation.
#[derive(Default)]
pub(crate) struct RecordingTracker {
    pub metrics: Mutex<Vec<(JobId, u64, u64)>>,
    pub finalized: Mutex<Vec<(JobId, JobStatus)>>,
}

#[async_trait]
impl TrackerBridge for RecordingTracker {
    async fn record_metrics(
        &self,
        job: &JobId,
        epoch: u64,
        step: u64,
        _metrics: &HashMap<String, f64>,
    ) {
        self.metrics.lock().push((job.clone(), epoch, step));
    }

    async fn finalize_run(&self, job: &JobId, status: JobStatus) {
        self.finalized.lock().push((job.clone(), status));
    }
}
