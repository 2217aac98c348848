// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription stream items.

use crate::detail::JobDetail;
use serde::{Deserialize, Serialize};
use ty_core::{JobId, LogLine, Progress};

/// One item on a job or session subscription stream.
///
/// Delivery is at-most-once and best-effort. A subscriber that receives
/// `behind` has overflowed its buffer and must re-fetch current state from
/// the query surface before trusting subsequent live events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Status or terminal-state change; carries the full updated record
    Record { detail: JobDetail },
    /// Applied progress report
    Progress { id: JobId, progress: Progress },
    /// Captured log lines
    Log { id: JobId, lines: Vec<LogLine> },
    /// This subscriber lagged and `missed` events were dropped
    Behind { missed: u64 },
}
