// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job submission request/response.

use serde::{Deserialize, Serialize};
use ty_core::{BackendKind, JobDescriptor, JobId, ResourceSpec, SessionId};

/// Submission input from the configuration-dialogue collaborator.
///
/// Accepted synchronously; the supervisor starts the job asynchronously
/// after the id is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub session: SessionId,
    pub backend: BackendKind,
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    #[serde(default)]
    pub resources: ResourceSpec,
}

impl SubmitJobRequest {
    /// Assign a job id and build the immutable descriptor. The callback URL
    /// is derived from the daemon's externally reachable base address.
    pub fn into_descriptor(self, callback_base: &str) -> JobDescriptor {
        let id = JobId::new();
        let callback_url =
            format!("{}/api/v1/callbacks/{}", callback_base.trim_end_matches('/'), id);
        let mut builder = JobDescriptor::builder(id, self.session, self.backend)
            .command(self.command)
            .env(self.env)
            .resources(self.resources)
            .callback_url(callback_url);
        if let Some(image) = self.image {
            builder = builder.image(image);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
