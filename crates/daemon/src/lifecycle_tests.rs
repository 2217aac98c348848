// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ty_core::test_support::descriptor_for;
use ty_core::{FailureKind, JobStatus, SessionId, SystemClock};

#[test]
fn lock_is_exclusive_per_state_dir() {
    let dir = tempfile::tempdir().unwrap();

    let first = acquire_lock(dir.path()).unwrap();
    assert!(matches!(acquire_lock(dir.path()), Err(DaemonError::AlreadyRunning(_))));

    drop(first);
    acquire_lock(dir.path()).unwrap();
}

#[test]
fn orphaned_jobs_are_failed_with_restart_reason() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::open(dir.path()).unwrap();
    let session = SessionId::from_string("ses-1");

    let in_flight = descriptor_for(&session);
    let done = descriptor_for(&session);
    store.create(in_flight.clone(), 1).unwrap();
    store.mark_running(&in_flight.id, None, 2).unwrap();
    store.create(done.clone(), 3).unwrap();
    store.mark_running(&done.id, None, 4).unwrap();
    store.complete(&done.id, Default::default(), vec![], 5).unwrap();

    let failed = reconcile_orphans(&store, &SystemClock);
    assert_eq!(failed, vec![in_flight.id.clone()]);

    let record = store.get(&in_flight.id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.failure.unwrap().kind, FailureKind::Restart);

    // Terminal records are untouched
    assert_eq!(store.get(&done.id).unwrap().status, JobStatus::Completed);
}
