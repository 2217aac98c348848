// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn job_id_has_prefix() {
    let id = JobId::new();
    assert!(id.as_str().starts_with("job-"));
    assert_eq!(id.as_str().len(), 23);
}

#[test]
fn session_id_has_prefix() {
    let id = SessionId::new();
    assert!(id.as_str().starts_with("ses-"));
}

#[test]
fn suffix_strips_prefix() {
    let id = JobId::from_string("job-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn suffix_tolerates_foreign_ids() {
    let id = JobId::from_string("external-id");
    assert_eq!(id.suffix(), "external-id");
}

#[test]
fn serde_is_transparent() {
    let id = JobId::from_string("job-xyz");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"job-xyz\"");

    let parsed: JobId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn compares_with_str() {
    let id = JobId::from_string("job-1");
    assert_eq!(id, "job-1");
    assert_ne!(id, "job-2");
}
