// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

/// Out-of-order progress over the wire: epoch 5 then epoch 3. The late
/// report gets a definitive 409 and the record keeps epoch 5.
#[tokio::test]
async fn out_of_order_progress_gets_conflict() {
    let daemon = start_daemon().await;
    let id = daemon.submit(&shell_job("sleep 10")).await;
    daemon.wait_status(&id, JobStatus::Running).await;

    let status = daemon.post_callback(&id, "progress", &json!({"epoch": 5})).await;
    assert!(status.is_success());

    let status = daemon.post_callback(&id, "progress", &json!({"epoch": 3})).await;
    assert_eq!(status, reqwest::StatusCode::CONFLICT);

    let detail = daemon.detail(&id).await;
    assert_eq!(detail.progress.unwrap().epoch, 5);
}

#[tokio::test]
async fn duplicate_completion_is_accepted_but_applied_once() {
    let daemon = start_daemon().await;
    let id = daemon.submit(&shell_job("sleep 10")).await;
    daemon.wait_status(&id, JobStatus::Running).await;

    let body = json!({"outcome": "succeeded", "metrics": {"accuracy": 0.8}});
    assert!(daemon.post_callback(&id, "completion", &body).await.is_success());
    let first = daemon.wait_status(&id, JobStatus::Completed).await;

    // Worker retry after a network blip: still 2xx, record unchanged
    assert!(daemon.post_callback(&id, "completion", &body).await.is_success());
    let second = daemon.detail(&id).await;
    assert_eq!(first.version, second.version);
}

#[tokio::test]
async fn progress_after_terminal_gets_conflict() {
    let daemon = start_daemon().await;
    let id = daemon.submit(&shell_job("exit 0")).await;
    daemon.wait_status(&id, JobStatus::Completed).await;

    let status = daemon.post_callback(&id, "progress", &json!({"epoch": 1})).await;
    assert_eq!(status, reqwest::StatusCode::CONFLICT);
}

#[tokio::test]
async fn callbacks_for_unknown_jobs_get_not_found() {
    let daemon = start_daemon().await;
    let ghost = JobId::from_string("job-ghost");

    let status = daemon.post_callback(&ghost, "started", &json!({})).await;
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_callback_bodies_are_rejected() {
    let daemon = start_daemon().await;
    let id = daemon.submit(&shell_job("sleep 10")).await;
    daemon.wait_status(&id, JobStatus::Running).await;

    // `epoch` is required and must be a number
    let status = daemon
        .post_callback(&id, "progress", &json!({"epoch": "third"}))
        .await;
    assert!(status.is_client_error());
    // The record is untouched by the protocol violation
    assert!(daemon.detail(&id).await.progress.is_none());
}

/// Cancel while running: the backend is told to stop and the record
/// flips to `cancelled` without waiting for the worker.
#[tokio::test]
async fn cancel_is_recorded_immediately() {
    let daemon = start_daemon().await;
    let id = daemon.submit(&shell_job("sleep 30")).await;
    daemon.wait_status(&id, JobStatus::Running).await;

    let response = daemon
        .client
        .post(daemon.url(&format!("/api/v1/jobs/{id}/cancel")))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let detail: JobDetail = response.json().await.unwrap();
    assert_eq!(detail.status, JobStatus::Cancelled);

    // Cancelling a terminal job is a definitive conflict
    let response = daemon
        .client
        .post(daemon.url(&format!("/api/v1/jobs/{id}/cancel")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
}

#[tokio::test]
async fn submission_for_unconfigured_backend_is_rejected() {
    let daemon = start_daemon().await;
    let mut request = shell_job("exit 0");
    request.backend = BackendKind::Kubernetes;

    let response = daemon
        .client
        .post(daemon.url("/api/v1/jobs"))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}
