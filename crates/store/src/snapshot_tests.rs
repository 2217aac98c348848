// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ty_core::test_support::descriptor;
use ty_core::JobEvent;

#[test]
fn save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    let mut state = MaterializedState::default();
    state.apply(&JobEvent::Created { descriptor: descriptor(), created_at_ms: 5 });

    Snapshot::save(&path, &state).unwrap();
    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.jobs.len(), 1);
    assert_eq!(loaded.jobs, state.jobs);
}

#[test]
fn load_missing_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Snapshot::load(&dir.path().join("snapshot.zst")).unwrap().is_none());
}

#[test]
fn unsupported_version_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    let json = serde_json::json!({"version": 99, "jobs": {}});
    let compressed = zstd::encode_all(json.to_string().as_bytes(), 3).unwrap();
    std::fs::write(&path, compressed).unwrap();

    assert!(matches!(
        Snapshot::load(&path),
        Err(SnapshotError::VersionMismatch { found: 99 })
    ));
}
