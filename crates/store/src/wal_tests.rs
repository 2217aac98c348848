// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write as _;
use ty_core::test_support::descriptor;
use ty_core::{JobEvent, JobId};

fn created() -> JobEvent {
    JobEvent::Created { descriptor: descriptor(), created_at_ms: 1 }
}

fn running(id: &str) -> JobEvent {
    JobEvent::Running { id: JobId::from_string(id), run_ref: None, at_ms: 2 }
}

#[test]
fn append_then_reopen_replays() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    {
        let (mut wal, events) = Wal::open(&path).unwrap();
        assert!(events.is_empty());
        wal.append(&created()).unwrap();
        wal.append(&running("job-1")).unwrap();
        assert_eq!(wal.entries(), 2);
    }

    let (wal, events) = Wal::open(&path).unwrap();
    assert_eq!(events, vec![created(), running("job-1")]);
    assert_eq!(wal.entries(), 2);
}

#[test]
fn torn_tail_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    {
        let (mut wal, _) = Wal::open(&path).unwrap();
        wal.append(&created()).unwrap();
    }
    // Simulate a crash mid-append: partial JSON with no closing brace
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    write!(file, "{{\"type\":\"job:runn").unwrap();

    let (_, events) = Wal::open(&path).unwrap();
    assert_eq!(events, vec![created()]);
}

#[test]
fn interior_corruption_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    std::fs::write(&path, "not json\n{\"also\": \"not an event\"}\n").unwrap();

    assert!(matches!(Wal::open(&path), Err(WalError::Corrupt { line: 1, .. })));
}

#[test]
fn truncate_resets_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    let (mut wal, _) = Wal::open(&path).unwrap();
    wal.append(&created()).unwrap();
    wal.truncate().unwrap();
    assert_eq!(wal.entries(), 0);
    wal.append(&running("job-1")).unwrap();
    drop(wal);

    let (_, events) = Wal::open(&path).unwrap();
    assert_eq!(events, vec![running("job-1")]);
}
