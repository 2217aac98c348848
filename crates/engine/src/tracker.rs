// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observability bridge to the experiment-tracking collaborator.

use async_trait::async_trait;
use std::collections::HashMap;
use ty_core::{JobId, JobStatus};

/// Narrow interface the engine invokes on every accepted progress and
/// completion; which tracking backend sits behind it (or none) is
/// irrelevant to the core. Implementations own their failures: tracking
/// must never delay or fail callback acceptance, so methods are infallible
/// here and implementations log internally.
#[async_trait]
pub trait TrackerBridge: Send + Sync {
    /// Record the metric map reported at an epoch/step.
    async fn record_metrics(
        &self,
        job: &JobId,
        epoch: u64,
        step: u64,
        metrics: &HashMap<String, f64>,
    );

    /// Mark the tracked run finished with the job's terminal status.
    async fn finalize_run(&self, job: &JobId, status: JobStatus);
}

/// Default bridge: no tracking backend configured.
pub struct NoopTracker;

#[async_trait]
impl TrackerBridge for NoopTracker {
    async fn record_metrics(
        &self,
        _job: &JobId,
        _epoch: u64,
        _step: u64,
        _metrics: &HashMap<String, f64>,
    ) {
    }

    async fn finalize_run(&self, _job: &JobId, _status: JobStatus) {}
}
