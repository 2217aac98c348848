// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes backend: runs each worker as a batch/v1 Job.
//!
//! The daemon creates Jobs via the cluster API with `restartPolicy: Never`
//! and `backoffLimit: 0`, then polls Job status until a terminal condition
//! appears. Scheduler conditions (`Complete`, `Failed` with reasons like
//! `BackoffLimitExceeded` or `DeadlineExceeded`) map onto the same
//! three-way terminal outcome as the local backend.

use crate::{
    BackendError, BackendEvent, BackendHandle, ExecutionBackend, LogChunk, TerminalStatus,
    CALLBACK_URL_ENV, JOB_ID_ENV,
};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job, JobSpec, JobStatus};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, Pod, PodSpec, PodTemplateSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use futures_util::{AsyncBufReadExt, TryStreamExt};
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::Client;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use ty_core::{BackendKind, JobDescriptor, JobFailure, JobId, StreamOrigin};

const JOB_ID_LABEL: &str = "trainyard.dev/job-id";
const APP_LABEL_VALUE: &str = "ty-job";

const LOG_CHANNEL_CAPACITY: usize = 256;

/// How long to wait for a pod to appear before giving up on log capture.
const POD_WAIT_ATTEMPTS: usize = 120;

#[derive(Debug, Clone)]
pub struct KubernetesConfig {
    pub namespace: String,
    /// Image used when the descriptor does not name one
    pub default_image: String,
    pub poll_interval: Duration,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            default_image: "trainyard/worker:latest".to_string(),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Batch-Job backend over `kube-rs`.
pub struct KubernetesBackend {
    jobs: Api<Job>,
    pods: Api<Pod>,
    config: KubernetesConfig,
    /// Handles we delivered a cancel for, so a subsequent Failed/absent
    /// Job maps to `Cancelled` rather than a crash
    cancelled: Arc<Mutex<HashSet<String>>>,
}

impl KubernetesBackend {
    /// Connect using the ambient kubeconfig / in-cluster environment.
    pub async fn new(config: KubernetesConfig) -> Result<Self, BackendError> {
        let client = Client::try_default()
            .await
            .map_err(|e| BackendError::Unreachable(format!("kube client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: KubernetesConfig) -> Self {
        let jobs = Api::namespaced(client.clone(), &config.namespace);
        let pods = Api::namespaced(client, &config.namespace);
        Self { jobs, pods, config, cancelled: Arc::new(Mutex::new(HashSet::new())) }
    }

    fn is_cancelled(&self, handle: &BackendHandle) -> bool {
        self.cancelled.lock().contains(handle.as_str())
    }

    /// Delete cluster Jobs carrying our app label that no live record
    /// references. Run at daemon startup to reap units orphaned by a crash.
    pub async fn cleanup_stale(&self, known: &HashSet<JobId>) {
        let lp = ListParams::default().labels(&format!("app={}", APP_LABEL_VALUE));
        let list = match self.jobs.list(&lp).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list cluster jobs for stale cleanup");
                return;
            }
        };

        for job in list {
            let Some(name) = job.metadata.name.clone() else { continue };
            let owner = job
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(JOB_ID_LABEL))
                .map(|id| JobId::from_string(id.as_str()));
            let orphaned = owner.map_or(true, |id| !known.contains(&id));
            if orphaned {
                tracing::info!(job = %name, "deleting orphaned cluster job");
                if let Err(e) = self.jobs.delete(&name, &DeleteParams::background()).await {
                    tracing::warn!(job = %name, error = %e, "failed to delete orphaned job");
                }
            }
        }
    }

    /// Find the worker pod for a Job, waiting for the scheduler to create it.
    async fn worker_pod(&self, job_name: &str) -> Result<String, BackendError> {
        let lp = ListParams::default().labels(&format!("job-name={}", job_name));
        for attempt in 0..POD_WAIT_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }
            let pods = self
                .pods
                .list(&lp)
                .await
                .map_err(|e| BackendError::Unreachable(format!("pod list: {}", e)))?;
            if let Some(name) = pods.items.into_iter().find_map(|p| p.metadata.name) {
                return Ok(name);
            }
        }
        Err(BackendError::Unreachable(format!("no pod appeared for job {}", job_name)))
    }
}

#[async_trait]
impl ExecutionBackend for KubernetesBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Kubernetes
    }

    async fn start(&self, descriptor: &JobDescriptor) -> Result<BackendHandle, BackendError> {
        let name = job_name(&descriptor.id);
        let manifest = build_job(descriptor, &name, &self.config.default_image);

        tracing::info!(
            job_id = %descriptor.id,
            job = %name,
            namespace = %self.config.namespace,
            "creating cluster job"
        );

        self.jobs
            .create(&PostParams::default(), &manifest)
            .await
            .map_err(|e| BackendError::LaunchFailed(format!("job creation failed: {}", e)))?;

        Ok(BackendHandle::new(name))
    }

    async fn monitor(
        &self,
        handle: &BackendHandle,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<TerminalStatus, BackendError> {
        loop {
            match self.jobs.get_status(handle.as_str()).await {
                Ok(job) => {
                    let status = job.status.unwrap_or_default();
                    if let Some(terminal) = map_status(&status, self.is_cancelled(handle)) {
                        self.cancelled.lock().remove(handle.as_str());
                        tracing::debug!(handle = %handle, ?terminal, "cluster job finished");
                        return Ok(terminal);
                    }
                    if status.active.unwrap_or(0) > 0 {
                        let _ = events.try_send(BackendEvent::Active);
                    }
                }
                Err(kube::Error::Api(err)) if err.code == 404 => {
                    // Deleted out from under us: our own cancel, or an
                    // operator reaping the Job
                    let cancelled = self.cancelled.lock().remove(handle.as_str());
                    return Ok(if cancelled {
                        TerminalStatus::Cancelled
                    } else {
                        TerminalStatus::Failed(JobFailure::crashed(
                            "job disappeared from the cluster",
                            None,
                        ))
                    });
                }
                Err(e) => return Err(BackendError::Unreachable(format!("job status: {}", e))),
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn cancel(&self, handle: &BackendHandle) -> Result<(), BackendError> {
        self.cancelled.lock().insert(handle.as_str().to_string());
        tracing::info!(handle = %handle, "deleting cluster job on cancel");
        match self.jobs.delete(handle.as_str(), &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            // Already gone — cancel is a no-op
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
            Err(e) => Err(BackendError::Unreachable(format!("job delete: {}", e))),
        }
    }

    async fn logs(&self, handle: &BackendHandle) -> Result<crate::LogStream, BackendError> {
        let pod = self.worker_pod(handle.as_str()).await?;
        let lp = LogParams { follow: true, ..LogParams::default() };
        let reader = self
            .pods
            .log_stream(&pod, &lp)
            .await
            .map_err(|e| BackendError::Unreachable(format!("log stream: {}", e)))?;

        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            // The cluster log API merges streams; everything arrives as stdout
            let mut lines = reader.lines();
            loop {
                match lines.try_next().await {
                    Ok(Some(line)) => {
                        if tx.send(LogChunk { stream: StreamOrigin::Stdout, line }).await.is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "pod log stream closed");
                        break;
                    }
                }
            }
        });
        Ok(rx)
    }
}

/// Cluster Job name for a job id: lowercase DNS-1123, deterministic.
fn job_name(id: &JobId) -> String {
    let suffix: String = id
        .suffix()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() {
                c
            } else {
                '-'
            }
        })
        .collect();
    let mut name = format!("ty-{}", suffix);
    name.truncate(63);
    name
}

/// Map a Job status onto a terminal outcome, or `None` while still running.
fn map_status(status: &JobStatus, cancelled: bool) -> Option<TerminalStatus> {
    for condition in status.conditions.iter().flatten() {
        if condition.status != "True" {
            continue;
        }
        match condition.type_.as_str() {
            "Complete" => return Some(TerminalStatus::Succeeded),
            "Failed" => {
                return Some(if cancelled {
                    TerminalStatus::Cancelled
                } else {
                    TerminalStatus::Failed(JobFailure::crashed(
                        "job failed on the cluster",
                        condition.reason.clone(),
                    ))
                })
            }
            _ => {}
        }
    }
    // Conditions can lag; a positive succeeded count is also authoritative
    if status.succeeded.unwrap_or(0) > 0 {
        return Some(TerminalStatus::Succeeded);
    }
    None
}

/// Build the batch/v1 Job manifest for a descriptor.
fn build_job(descriptor: &JobDescriptor, name: &str, default_image: &str) -> Job {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), APP_LABEL_VALUE.to_string());
    labels.insert(JOB_ID_LABEL.to_string(), descriptor.id.as_str().to_string());

    let mut env: Vec<EnvVar> = descriptor
        .env
        .iter()
        .map(|(k, v)| EnvVar { name: k.clone(), value: Some(v.clone()), value_from: None })
        .collect();
    env.push(EnvVar {
        name: JOB_ID_ENV.to_string(),
        value: Some(descriptor.id.as_str().to_string()),
        value_from: None,
    });
    env.push(EnvVar {
        name: CALLBACK_URL_ENV.to_string(),
        value: Some(descriptor.callback_url.clone()),
        value_from: None,
    });

    let image =
        descriptor.image.clone().unwrap_or_else(|| default_image.to_string());

    let container = Container {
        name: "trainer".to_string(),
        image: Some(image),
        args: if descriptor.command.is_empty() {
            None
        } else {
            Some(descriptor.command.clone())
        },
        env: Some(env),
        resources: resource_requirements(descriptor),
        ..Container::default()
    };

    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(labels), ..ObjectMeta::default() }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![container],
                    ..PodSpec::default()
                }),
            },
            ..JobSpec::default()
        }),
        status: None,
    }
}

fn resource_requirements(descriptor: &JobDescriptor) -> Option<ResourceRequirements> {
    let resources = &descriptor.resources;
    let mut limits = BTreeMap::new();
    if resources.gpus > 0 {
        limits.insert("nvidia.com/gpu".to_string(), Quantity(resources.gpus.to_string()));
    }
    if let Some(cpu) = resources.cpu_millis {
        limits.insert("cpu".to_string(), Quantity(format!("{}m", cpu)));
    }
    if let Some(memory) = resources.memory_mb {
        limits.insert("memory".to_string(), Quantity(format!("{}Mi", memory)));
    }
    if limits.is_empty() {
        return None;
    }
    Some(ResourceRequirements {
        limits: Some(limits),
        ..ResourceRequirements::default()
    })
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod tests;
