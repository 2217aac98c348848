// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSON-lines write-ahead log of job events.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use ty_core::JobEvent;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("WAL I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt WAL entry at line {line}: {source}")]
    Corrupt { line: usize, source: serde_json::Error },
}

/// Append-only event log.
///
/// One JSON event per line, fsynced on every append — a callback is only
/// acknowledged to the worker after its event is durable. A torn final
/// line (crash mid-write) is tolerated on replay; corruption anywhere
/// earlier is an error.
pub struct Wal {
    path: PathBuf,
    file: File,
    entries: u64,
}

impl Wal {
    /// Open the WAL at `path`, replaying any existing entries.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, Vec<JobEvent>), WalError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let events = if path.exists() { Self::replay(&path)? } else { Vec::new() };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let entries = events.len() as u64;
        Ok((Self { path, file, entries }, events))
    }

    fn replay(path: &Path) -> Result<Vec<JobEvent>, WalError> {
        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();
        let mut lines = reader.lines().enumerate().peekable();
        while let Some((idx, line)) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JobEvent>(&line) {
                Ok(event) => events.push(event),
                // The last line may be torn by a crash mid-append
                Err(source) if lines.peek().is_none() => {
                    tracing::warn!(line = idx + 1, %source, "discarding torn WAL tail");
                }
                Err(source) => return Err(WalError::Corrupt { line: idx + 1, source }),
            }
        }
        Ok(events)
    }

    /// Append one event and fsync before returning.
    pub fn append(&mut self, event: &JobEvent) -> Result<(), WalError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_data()?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries written or replayed.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Discard all entries. Used after a snapshot has captured the state.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_data()?;
        self.entries = 0;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
