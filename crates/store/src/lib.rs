// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable Job Store for Trainyard.
//!
//! The store is the single source of truth for job state. Mutations are
//! event-sourced: every accepted change appends a [`ty_core::JobEvent`] to
//! a JSON-lines WAL *before* it is acknowledged, then folds it into the
//! in-memory [`MaterializedState`]. Replaying the WAL (on top of an
//! optional zstd snapshot) reproduces the state after a restart.

mod logs;
mod snapshot;
mod state;
mod store;
mod wal;

pub use logs::LogStore;
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use store::{JobStore, StoreError};
pub use wal::{Wal, WalError};
