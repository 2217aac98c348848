// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log line shape for the append-only log table.

use serde::{Deserialize, Serialize};

/// Which output stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

crate::simple_display! {
    StreamOrigin {
        Stdout => "stdout",
        Stderr => "stderr",
    }
}

/// One captured output line.
///
/// Append-only and ordered within a job by `seq` (arrival order). The
/// engine never mutates or deletes log lines; retention is an external
/// concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub seq: u64,
    pub stream: StreamOrigin,
    pub line: String,
    pub at_ms: u64,
}
