// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end specs: real HTTP surface, real local subprocess workers.
//!
//! The tests play the isolated worker themselves, posting callbacks over
//! HTTP exactly the way a training process would.

mod callbacks;
mod lifecycle;
mod recovery;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use ty_backend::LocalProcessBackend;
use ty_core::{BackendKind, JobId, JobStatus, ResourceSpec, SessionId, SystemClock};
use ty_daemon::{router, serve, AppState};
use ty_engine::{CollectorConfig, Supervisor, SupervisorConfig};
use ty_protocol::{JobDetail, SubmitJobRequest, SubmitJobResponse};
use ty_store::{JobStore, LogStore};

pub(crate) struct TestDaemon {
    pub base: String,
    pub client: reqwest::Client,
    shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub(crate) async fn start_daemon() -> TestDaemon {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JobStore::open(dir.path()).unwrap());
    let logs = Arc::new(LogStore::new(dir.path().join("logs")));

    let supervisor = Supervisor::builder(store, logs, Arc::new(SystemClock))
        .backend(Arc::new(LocalProcessBackend::new().with_grace(Duration::from_millis(200))))
        .config(SupervisorConfig {
            monitor_attempts: 3,
            monitor_backoff: Duration::from_millis(10),
            collector: CollectorConfig {
                batch_size: 10,
                flush_interval: Duration::from_millis(30),
                forward_attempts: 1,
            },
        })
        .build();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");

    let state = AppState { supervisor, callback_base: base.clone() };
    let shutdown = CancellationToken::new();
    tokio::spawn(serve(listener, router(state), shutdown.clone()));

    TestDaemon { base, client: reqwest::Client::new(), shutdown, _dir: dir }
}

pub(crate) fn shell_job(script: &str) -> SubmitJobRequest {
    SubmitJobRequest {
        session: SessionId::new(),
        backend: BackendKind::LocalProcess,
        command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        image: None,
        env: vec![],
        resources: ResourceSpec::default(),
    }
}

impl TestDaemon {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn submit(&self, request: &SubmitJobRequest) -> JobId {
        let response = self
            .client
            .post(self.url("/api/v1/jobs"))
            .json(request)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success(), "submit failed: {}", response.status());
        response.json::<SubmitJobResponse>().await.unwrap().job_id
    }

    pub async fn detail(&self, id: &JobId) -> JobDetail {
        self.client
            .get(self.url(&format!("/api/v1/jobs/{id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    pub async fn wait_status(&self, id: &JobId, status: JobStatus) -> JobDetail {
        for _ in 0..400 {
            let detail = self.detail(id).await;
            if detail.status == status {
                return detail;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached {status}");
    }

    pub async fn post_callback(
        &self,
        id: &JobId,
        kind: &str,
        body: &serde_json::Value,
    ) -> reqwest::StatusCode {
        self.client
            .post(self.url(&format!("/api/v1/callbacks/{id}/{kind}")))
            .json(body)
            .send()
            .await
            .unwrap()
            .status()
    }
}
