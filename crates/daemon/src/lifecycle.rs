// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup lifecycle: single-instance lock and restart reconciliation.

use crate::error::DaemonError;
use fs2::FileExt;
use std::fs::File;
use std::path::Path;
use ty_core::{Clock, JobFailure, JobId};
use ty_store::JobStore;

/// Take the exclusive daemon lock under the state dir. The returned file
/// must stay alive for the process lifetime.
pub fn acquire_lock(state_dir: &Path) -> Result<File, DaemonError> {
    std::fs::create_dir_all(state_dir)?;
    let path = state_dir.join("tyd.lock");
    let file = File::create(&path)?;
    file.try_lock_exclusive().map_err(|_| DaemonError::AlreadyRunning(path))?;
    Ok(file)
}

/// Fail every record left non-terminal by a previous process.
///
/// Supervisor tasks do not survive a restart, so whatever was in flight
/// has lost its monitor, so the honest terminal state is a structured
/// failure, not a silently stuck `running`.
pub fn reconcile_orphans(store: &JobStore, clock: &dyn Clock) -> Vec<JobId> {
    let mut failed = Vec::new();
    for record in store.non_terminal() {
        let id = record.id().clone();
        match store.fail(&id, JobFailure::restart(), clock.epoch_ms()) {
            Ok(_) => {
                tracing::warn!(job_id = %id, previous = %record.status, "failed orphaned job");
                failed.push(id);
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "could not reconcile orphaned job");
            }
        }
    }
    failed
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
