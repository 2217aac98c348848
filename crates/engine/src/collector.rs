// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log collector — batches worker output into the store and the hub.

use crate::hub::BroadcastHub;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use ty_backend::{LogChunk, LogStream};
use ty_core::{Clock, JobId, LogLine, SessionId};
use ty_protocol::StreamEvent;
use ty_store::LogStore;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Flush once this many lines are buffered
    pub batch_size: usize,
    /// Flush when no new line arrived for this long
    pub flush_interval: Duration,
    /// Attempts for the external forward before the batch is dropped
    pub forward_attempts: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_millis(500),
            forward_attempts: 3,
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ForwardError(pub String);

/// External log-aggregation collaborator.
///
/// Strictly best-effort: forwarding failures are logged and bounded-retried,
/// never allowed to block or fail the primary write — the store copy is the
/// durable record.
#[async_trait]
pub trait LogForwarder: Send + Sync {
    async fn forward(&self, job: &JobId, lines: &[LogLine]) -> Result<(), ForwardError>;
}

/// Default forwarder: no aggregation collaborator configured.
pub struct NoopForwarder;

#[async_trait]
impl LogForwarder for NoopForwarder {
    async fn forward(&self, _job: &JobId, _lines: &[LogLine]) -> Result<(), ForwardError> {
        Ok(())
    }
}

/// Reads an execution's output stream for its whole life, batching lines
/// and dual-writing each batch: append to the store's log table, publish
/// to the hub, then best-effort forward.
pub struct LogCollector {
    logs: Arc<LogStore>,
    hub: BroadcastHub,
    forwarder: Arc<dyn LogForwarder>,
    config: CollectorConfig,
    clock: Arc<dyn Clock>,
}

impl LogCollector {
    pub fn new(
        logs: Arc<LogStore>,
        hub: BroadcastHub,
        forwarder: Arc<dyn LogForwarder>,
        config: CollectorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { logs, hub, forwarder, config, clock }
    }

    /// Consume the stream until the execution's output ends, flushing on
    /// batch-size threshold or idle timeout, whichever comes first.
    pub async fn run(&self, id: &JobId, session: &SessionId, mut stream: LogStream) {
        let mut batch: Vec<LogChunk> = Vec::new();
        loop {
            tokio::select! {
                chunk = stream.recv() => match chunk {
                    Some(chunk) => {
                        batch.push(chunk);
                        if batch.len() >= self.config.batch_size {
                            self.flush(id, session, &mut batch).await;
                        }
                    }
                    None => break,
                },
                () = tokio::time::sleep(self.config.flush_interval), if !batch.is_empty() => {
                    self.flush(id, session, &mut batch).await;
                }
            }
        }
        if !batch.is_empty() {
            self.flush(id, session, &mut batch).await;
        }
        tracing::debug!(job_id = %id, "log stream ended");
    }

    async fn flush(&self, id: &JobId, session: &SessionId, batch: &mut Vec<LogChunk>) {
        let chunks = std::mem::take(batch);
        let at_ms = self.clock.epoch_ms();

        // Arrival order is preserved by appending consecutive same-stream
        // runs; the store assigns the sequence numbers
        let mut tagged: Vec<LogLine> = Vec::with_capacity(chunks.len());
        let mut run: Vec<String> = Vec::new();
        let mut run_stream = None;
        for chunk in chunks {
            if run_stream != Some(chunk.stream) && !run.is_empty() {
                if let Some(stream) = run_stream {
                    tagged.extend(self.logs.append(id, stream, std::mem::take(&mut run), at_ms));
                }
            }
            run_stream = Some(chunk.stream);
            run.push(chunk.line);
        }
        if let (Some(stream), false) = (run_stream, run.is_empty()) {
            tagged.extend(self.logs.append(id, stream, run, at_ms));
        }

        if tagged.is_empty() {
            return;
        }

        self.hub.publish(
            id,
            session,
            StreamEvent::Log { id: id.clone(), lines: tagged.clone() },
        );
        self.forward(id, &tagged).await;
    }

    async fn forward(&self, id: &JobId, lines: &[LogLine]) {
        for attempt in 1..=self.config.forward_attempts {
            match self.forwarder.forward(id, lines).await {
                Ok(()) => return,
                Err(e) if attempt == self.config.forward_attempts => {
                    tracing::warn!(
                        job_id = %id,
                        error = %e,
                        attempts = attempt,
                        dropped = lines.len(),
                        "log forward attempts exhausted, dropping batch"
                    );
                }
                Err(e) => {
                    tracing::debug!(job_id = %id, error = %e, attempt, "log forward failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "collector_tests.rs"]
mod tests;
