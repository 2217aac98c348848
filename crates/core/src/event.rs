// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the Trainyard system.
//!
//! Events are both the durable WAL entries of the Job Store and the
//! payloads republished through the Broadcast Hub. Replaying the WAL from
//! the start reproduces the materialized job state exactly.

use crate::descriptor::JobDescriptor;
use crate::id::JobId;
use crate::job::{CheckpointRef, JobFailure, Progress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn is_empty_map<K, V>(map: &HashMap<K, V>) -> bool {
    map.is_empty()
}

/// State changes of a single job.
///
/// Serializes with `{"type": "job:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    #[serde(rename = "job:created")]
    Created { descriptor: JobDescriptor, created_at_ms: u64 },

    /// Backend accepted the start request; `handle` addresses the unit
    #[serde(rename = "job:starting")]
    Starting { id: JobId, handle: String, at_ms: u64 },

    /// Worker observed executing — via `started` callback or backend monitor
    #[serde(rename = "job:running")]
    Running {
        id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_ref: Option<String>,
        at_ms: u64,
    },

    #[serde(rename = "job:progress")]
    Progress {
        id: JobId,
        progress: Progress,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        checkpoints: Vec<CheckpointRef>,
        at_ms: u64,
    },

    #[serde(rename = "job:completed")]
    Completed {
        id: JobId,
        #[serde(default, skip_serializing_if = "is_empty_map")]
        metrics: HashMap<String, f64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        checkpoints: Vec<CheckpointRef>,
        at_ms: u64,
    },

    #[serde(rename = "job:failed")]
    Failed { id: JobId, failure: JobFailure, at_ms: u64 },

    #[serde(rename = "job:cancelled")]
    Cancelled { id: JobId, at_ms: u64 },
}

impl JobEvent {
    /// The job this event belongs to.
    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::Created { descriptor, .. } => &descriptor.id,
            JobEvent::Starting { id, .. }
            | JobEvent::Running { id, .. }
            | JobEvent::Progress { id, .. }
            | JobEvent::Completed { id, .. }
            | JobEvent::Failed { id, .. }
            | JobEvent::Cancelled { id, .. } => id,
        }
    }
}

crate::simple_display! {
    JobEvent {
        Created { .. } => "job:created",
        Starting { .. } => "job:starting",
        Running { .. } => "job:running",
        Progress { .. } => "job:progress",
        Completed { .. } => "job:completed",
        Failed { .. } => "job:failed",
        Cancelled { .. } => "job:cancelled",
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
