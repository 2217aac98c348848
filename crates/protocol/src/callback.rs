// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callback payloads the isolated worker posts to the gateway.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ty_core::CheckpointRef;

/// `started`: the worker came up and reports its own run identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartedCallback {
    /// The worker's internal run id, for observability-backend linkage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_ref: Option<String>,
}

/// `progress`: periodic report. Applied only when the (epoch, step) pair
/// is newer than the last applied one; retried or reordered deliveries are
/// discarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressCallback {
    pub epoch: u64,
    #[serde(default)]
    pub step: u64,
    /// Open metric map, schema-free across training frameworks
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointRef>,
    /// Optional excerpt of recent worker output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_excerpt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Succeeded,
    Failed,
}

/// Structured error reported by a failing worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// `completion`: the worker's final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionCallback {
    pub outcome: CallbackOutcome,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointRef>,
    /// Present when `outcome` is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkerError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
