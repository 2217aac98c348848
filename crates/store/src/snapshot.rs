// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! zstd-compressed state snapshots for WAL compaction.

use crate::state::MaterializedState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use ty_core::{JobId, JobRecord};

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found} (current {CURRENT_SNAPSHOT_VERSION})")]
    VersionMismatch { found: u32 },
}

/// Serialized form of the materialized state at a point in time.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub jobs: HashMap<JobId, JobRecord>,
}

impl Snapshot {
    /// Write a snapshot of `state` atomically (temp file + rename).
    pub fn save(path: &Path, state: &MaterializedState) -> Result<(), SnapshotError> {
        let snapshot =
            Snapshot { version: CURRENT_SNAPSHOT_VERSION, jobs: state.jobs.clone() };
        let json = serde_json::to_vec(&snapshot)?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("zst.tmp");
        fs::write(&tmp, compressed)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot, returning `None` when no snapshot exists yet.
    pub fn load(path: &Path) -> Result<Option<MaterializedState>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let compressed = fs::read(path)?;
        let json = zstd::decode_all(compressed.as_slice())?;
        let snapshot: Snapshot = serde_json::from_slice(&json)?;
        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch { found: snapshot.version });
        }
        Ok(Some(MaterializedState { jobs: snapshot.jobs }))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
