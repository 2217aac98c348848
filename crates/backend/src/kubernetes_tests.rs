// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use k8s_openapi::api::batch::v1::JobCondition;
use ty_core::test_support::descriptor;

fn condition(type_: &str, status: &str, reason: Option<&str>) -> JobCondition {
    JobCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: reason.map(str::to_string),
        ..JobCondition::default()
    }
}

#[test]
fn job_name_is_dns_safe() {
    let id = JobId::from_string("job-Ab_C9-xYz");
    let name = job_name(&id);
    assert_eq!(name, "ty-ab-c9-xyz");
    assert!(name.len() <= 63);
    assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
}

#[test]
fn manifest_injects_callback_env_and_labels() {
    let descriptor = descriptor();
    let manifest = build_job(&descriptor, "ty-test", "default/image:1");

    let labels = manifest.metadata.labels.unwrap();
    assert_eq!(labels.get("app").map(String::as_str), Some(APP_LABEL_VALUE));
    assert_eq!(labels.get(JOB_ID_LABEL).map(String::as_str), Some(descriptor.id.as_str()));

    let spec = manifest.spec.unwrap();
    assert_eq!(spec.backoff_limit, Some(0));
    let pod = spec.template.spec.unwrap();
    assert_eq!(pod.restart_policy.as_deref(), Some("Never"));

    let container = &pod.containers[0];
    let env = container.env.as_ref().unwrap();
    let callback = env.iter().find(|e| e.name == CALLBACK_URL_ENV).unwrap();
    assert_eq!(callback.value.as_deref(), Some(descriptor.callback_url.as_str()));
    assert!(env.iter().any(|e| e.name == JOB_ID_ENV));
}

#[test]
fn manifest_prefers_descriptor_image() {
    let mut descriptor = descriptor();
    descriptor.image = Some("registry.local/custom:2".to_string());
    let manifest = build_job(&descriptor, "ty-test", "default/image:1");
    let pod = manifest.spec.unwrap().template.spec.unwrap();
    assert_eq!(pod.containers[0].image.as_deref(), Some("registry.local/custom:2"));
}

#[test]
fn gpu_request_becomes_a_limit() {
    let mut descriptor = descriptor();
    descriptor.resources.gpus = 2;
    let manifest = build_job(&descriptor, "ty-test", "img");
    let pod = manifest.spec.unwrap().template.spec.unwrap();
    let limits = pod.containers[0].resources.as_ref().unwrap().limits.as_ref().unwrap();
    assert_eq!(limits.get("nvidia.com/gpu").map(|q| q.0.as_str()), Some("2"));
}

#[test]
fn no_resources_means_no_requirements_block() {
    let manifest = build_job(&descriptor(), "ty-test", "img");
    let pod = manifest.spec.unwrap().template.spec.unwrap();
    assert!(pod.containers[0].resources.is_none());
}

#[yare::parameterized(
    complete          = { "Complete", None, Some(TerminalStatus::Succeeded) },
    failed_backoff    = { "Failed", Some("BackoffLimitExceeded"), None },
    failed_deadline   = { "Failed", Some("DeadlineExceeded"), None },
    suspended_ignored = { "Suspended", None, None },
)]
fn condition_mapping(type_: &str, reason: Option<&str>, succeeded: Option<TerminalStatus>) {
    let status = JobStatus {
        conditions: Some(vec![condition(type_, "True", reason)]),
        ..JobStatus::default()
    };
    let mapped = map_status(&status, false);
    match (type_, succeeded) {
        ("Failed", _) => match mapped {
            Some(TerminalStatus::Failed(failure)) => {
                assert_eq!(failure.reason, "job failed on the cluster");
                assert_eq!(failure.detail.as_deref(), reason);
            }
            other => panic!("expected failure, got {:?}", other),
        },
        (_, expected) => assert_eq!(mapped, expected),
    }
}

#[test]
fn false_conditions_are_ignored() {
    let status = JobStatus {
        conditions: Some(vec![condition("Failed", "False", None)]),
        active: Some(1),
        ..JobStatus::default()
    };
    assert_eq!(map_status(&status, false), None);
}

#[test]
fn failed_condition_after_cancel_maps_to_cancelled() {
    let status = JobStatus {
        conditions: Some(vec![condition("Failed", "True", Some("BackoffLimitExceeded"))]),
        ..JobStatus::default()
    };
    assert_eq!(map_status(&status, true), Some(TerminalStatus::Cancelled));
}

#[test]
fn succeeded_count_without_condition_is_terminal() {
    let status = JobStatus { succeeded: Some(1), ..JobStatus::default() };
    assert_eq!(map_status(&status, false), Some(TerminalStatus::Succeeded));
}
