// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

/// A worker that sends one progress and one successful completion, with
/// the process itself exiting 0: the job must land in `completed` with
/// the reported metrics on the record.
#[tokio::test]
async fn local_job_with_progress_and_completion_completes() {
    let daemon = start_daemon().await;
    let id = daemon.submit(&shell_job("sleep 5")).await;
    daemon.wait_status(&id, JobStatus::Running).await;

    let status = daemon.post_callback(&id, "started", &json!({"run_ref": "run-42"})).await;
    assert!(status.is_success());

    let status = daemon
        .post_callback(
            &id,
            "progress",
            &json!({"epoch": 1, "step": 10, "metrics": {"loss": 0.42}}),
        )
        .await;
    assert!(status.is_success());

    let status = daemon
        .post_callback(
            &id,
            "completion",
            &json!({"outcome": "succeeded", "metrics": {"accuracy": 0.91}}),
        )
        .await;
    assert!(status.is_success());

    let detail = daemon.wait_status(&id, JobStatus::Completed).await;
    let progress = detail.progress.unwrap();
    assert_eq!(progress.metrics.get("loss"), Some(&0.42));
    assert_eq!(progress.metrics.get("accuracy"), Some(&0.91));
    assert_eq!(detail.run_ref.as_deref(), Some("run-42"));
}

/// A worker killed externally before any callback: the backend monitor
/// alone must drive the job to `failed`.
#[tokio::test]
async fn killed_worker_fails_without_any_callback() {
    let daemon = start_daemon().await;
    let id = daemon.submit(&shell_job("sleep 30")).await;

    let detail = daemon.wait_status(&id, JobStatus::Running).await;
    let handle = detail.backend_handle.unwrap();
    let pid: i32 = handle.trim_start_matches("pid:").parse().unwrap();
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGKILL)
        .unwrap();

    let detail = daemon.wait_status(&id, JobStatus::Failed).await;
    let failure = detail.failure.unwrap();
    assert_eq!(failure.reason, "process exited abnormally");
    assert!(detail.progress.is_none());
}

/// Worker stdout is captured into the durable log table and served back.
#[tokio::test]
async fn worker_output_is_captured_and_queryable() {
    let daemon = start_daemon().await;
    let id = daemon
        .submit(&shell_job("echo 'epoch 1/3'; echo 'warning: slow io' >&2; exit 0"))
        .await;
    daemon.wait_status(&id, JobStatus::Completed).await;

    // Collector flush is asynchronous to the terminal transition
    let mut lines: Vec<ty_core::LogLine> = Vec::new();
    for _ in 0..100 {
        lines = daemon
            .client
            .get(daemon.url(&format!("/api/v1/jobs/{id}/logs")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if lines.len() >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert!(lines.iter().any(|l| l.line.contains("epoch 1/3")));
    assert!(lines
        .iter()
        .any(|l| l.stream == ty_core::StreamOrigin::Stderr && l.line.contains("slow io")));
}

#[tokio::test]
async fn completed_worker_without_completion_callback_succeeds_via_exit_code() {
    let daemon = start_daemon().await;
    let id = daemon.submit(&shell_job("exit 0")).await;

    // No callbacks at all: exit code 0 alone completes the job
    let detail = daemon.wait_status(&id, JobStatus::Completed).await;
    assert!(detail.failure.is_none());
}

#[tokio::test]
async fn session_query_lists_all_jobs_for_the_owner() {
    let daemon = start_daemon().await;
    let mut request = shell_job("exit 0");
    let session = request.session.clone();
    let first = daemon.submit(&request).await;
    request.command = vec!["sh".into(), "-c".into(), "exit 1".into()];
    let second = daemon.submit(&request).await;

    daemon.wait_status(&first, JobStatus::Completed).await;
    daemon.wait_status(&second, JobStatus::Failed).await;

    let details: Vec<JobDetail> = daemon
        .client
        .get(daemon.url(&format!("/api/v1/sessions/{session}/jobs")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(details.len(), 2);
}
