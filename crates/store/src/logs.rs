// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-job log table.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use ty_core::{JobId, LogLine, StreamOrigin};

/// Append-only log table, one JSON-lines file per job under
/// `<log_dir>/job/<job_id>.log`.
///
/// Lines are ordered by an arrival-sequence counter assigned here. Write
/// failures are logged via tracing but do not propagate; log capture must
/// never break the engine (the batch is still returned for broadcast).
pub struct LogStore {
    log_dir: PathBuf,
    seqs: Mutex<HashMap<JobId, u64>>,
}

impl LogStore {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into(), seqs: Mutex::new(HashMap::new()) }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    fn job_log_path(&self, id: &JobId) -> PathBuf {
        self.log_dir.join("job").join(format!("{}.log", id))
    }

    /// Append a batch of raw lines, assigning arrival sequence numbers.
    /// Returns the tagged lines for broadcast.
    pub fn append(
        &self,
        id: &JobId,
        stream: StreamOrigin,
        lines: Vec<String>,
        at_ms: u64,
    ) -> Vec<LogLine> {
        if lines.is_empty() {
            return Vec::new();
        }

        let entries = {
            let mut seqs = self.seqs.lock();
            let next = seqs.entry(id.clone()).or_insert_with(|| self.persisted_count(id));
            lines
                .into_iter()
                .map(|line| {
                    let entry = LogLine { seq: *next, stream, line, at_ms };
                    *next += 1;
                    entry
                })
                .collect::<Vec<_>>()
        };

        if let Err(e) = self.write_entries(id, &entries) {
            tracing::warn!(job_id = %id, error = %e, "failed to write job log batch");
        }
        entries
    }

    fn write_entries(&self, id: &JobId, entries: &[LogLine]) -> std::io::Result<()> {
        let path = self.job_log_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    /// Resume the sequence counter from what is already on disk.
    fn persisted_count(&self, id: &JobId) -> u64 {
        let path = self.job_log_path(id);
        match File::open(path) {
            Ok(file) => BufReader::new(file).lines().count() as u64,
            Err(_) => 0,
        }
    }

    /// Read all log lines for a job, in arrival order.
    pub fn read(&self, id: &JobId) -> std::io::Result<Vec<LogLine>> {
        let path = self.job_log_path(id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogLine>(&line) {
                Ok(entry) => lines.push(entry),
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "skipping corrupt log line");
                }
            }
        }
        Ok(lines)
    }

    /// Read the last `n` log lines for a job.
    pub fn tail(&self, id: &JobId, n: usize) -> std::io::Result<Vec<LogLine>> {
        let mut lines = self.read(id)?;
        if lines.len() > n {
            lines.drain(..lines.len() - n);
        }
        Ok(lines)
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
