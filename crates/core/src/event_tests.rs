// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::JobFailure;

#[test]
fn events_serialize_with_type_tag() {
    let event = JobEvent::Starting { id: JobId::from_string("job-1"), handle: "pid:42".into(), at_ms: 7 };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "job:starting");
    assert_eq!(json["handle"], "pid:42");

    let back: JobEvent = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn failed_event_carries_structured_failure() {
    let event = JobEvent::Failed {
        id: JobId::from_string("job-1"),
        failure: JobFailure::launch_failed("image not found"),
        at_ms: 7,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "job:failed");
    assert_eq!(json["failure"]["kind"], "launch_failed");
    assert_eq!(json["failure"]["detail"], "image not found");
}

#[test]
fn job_id_accessor_covers_all_variants() {
    let id = JobId::from_string("job-9");
    let events = vec![
        JobEvent::Starting { id: id.clone(), handle: "h".into(), at_ms: 0 },
        JobEvent::Running { id: id.clone(), run_ref: None, at_ms: 0 },
        JobEvent::Cancelled { id: id.clone(), at_ms: 0 },
    ];
    for event in events {
        assert_eq!(event.job_id(), &id);
    }
}
