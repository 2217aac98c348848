// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable job descriptor — the submission input.

use crate::id::{JobId, SessionId};
use serde::{Deserialize, Serialize};

/// Which execution backend runs the isolated worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Child process on the orchestrator host
    LocalProcess,
    /// batch/v1 Job on a Kubernetes cluster
    Kubernetes,
}

crate::simple_display! {
    BackendKind {
        LocalProcess => "local_process",
        Kubernetes => "kubernetes",
    }
}

/// Resource request for the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default)]
    pub gpus: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
}

/// Immutable input describing one unit of training work.
///
/// Created once at submission time and never mutated. The callback URL is
/// the address the isolated worker reports back to; it is injected into the
/// worker's environment by the execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    /// Owning session, for subscription routing
    pub session: SessionId,
    pub backend: BackendKind,
    /// Worker entrypoint: argv for a local process, container args on a cluster
    pub command: Vec<String>,
    /// Container image (cluster backend only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Framework parameters passed through as environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
    #[serde(default)]
    pub resources: ResourceSpec,
    /// Base address the worker must send callbacks to
    pub callback_url: String,
}

impl JobDescriptor {
    pub fn builder(id: JobId, session: SessionId, backend: BackendKind) -> JobDescriptorBuilder {
        JobDescriptorBuilder {
            id,
            session,
            backend,
            command: Vec::new(),
            image: None,
            env: Vec::new(),
            resources: ResourceSpec::default(),
            callback_url: String::new(),
        }
    }
}

pub struct JobDescriptorBuilder {
    id: JobId,
    session: SessionId,
    backend: BackendKind,
    command: Vec<String>,
    image: Option<String>,
    env: Vec<(String, String)>,
    resources: ResourceSpec,
    callback_url: String,
}

impl JobDescriptorBuilder {
    crate::setters! {
        into {
            callback_url: String,
        }
        set {
            command: Vec<String>,
            env: Vec<(String, String)>,
            resources: ResourceSpec,
        }
        option {
            image: String,
        }
    }

    pub fn build(self) -> JobDescriptor {
        JobDescriptor {
            id: self.id,
            session: self.session,
            backend: self.backend,
            command: self.command,
            image: self.image,
            env: self.env,
            resources: self.resources,
            callback_url: self.callback_url,
        }
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
