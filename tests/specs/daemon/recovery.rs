// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use ty_core::test_support::descriptor_for;
use ty_core::{FailureKind, JobStatus, SessionId, SystemClock};
use ty_daemon::lifecycle::reconcile_orphans;
use ty_store::JobStore;

/// Jobs left in flight by a crashed daemon are failed with an explicit
/// restart reason on the next startup, and that determination survives
/// further restarts via the WAL.
#[test]
fn restart_reconciliation_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let session = SessionId::from_string("ses-recovery");
    let running = descriptor_for(&session);
    let finished = descriptor_for(&session);

    {
        let store = JobStore::open(dir.path()).unwrap();
        store.create(running.clone(), 1).unwrap();
        store.mark_starting(&running.id, "pid:4242", 2).unwrap();
        store.mark_running(&running.id, None, 3).unwrap();

        store.create(finished.clone(), 4).unwrap();
        store.mark_running(&finished.id, None, 5).unwrap();
        store.complete(&finished.id, HashMap::new(), vec![], 6).unwrap();
        // Simulated crash: supervisor tasks are gone, WAL remains
    }

    {
        let store = JobStore::open(dir.path()).unwrap();
        let failed = reconcile_orphans(&store, &SystemClock);
        assert_eq!(failed, vec![running.id.clone()]);

        let record = store.get(&running.id).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.failure.as_ref().unwrap().kind, FailureKind::Restart);
        assert_eq!(record.backend_handle.as_deref(), Some("pid:4242"));
    }

    // Third start: nothing left to reconcile, determinations persisted
    let store = JobStore::open(dir.path()).unwrap();
    assert!(reconcile_orphans(&store, &SystemClock).is_empty());
    assert_eq!(store.get(&running.id).unwrap().status, JobStatus::Failed);
    assert_eq!(store.get(&finished.id).unwrap().status, JobStatus::Completed);
}
