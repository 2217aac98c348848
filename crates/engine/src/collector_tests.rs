// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use ty_backend::LogChunk;
use ty_core::{FakeClock, JobId, SessionId, StreamOrigin};
use ty_store::LogStore;

struct Fixture {
    collector: Arc<LogCollector>,
    logs: Arc<LogStore>,
    hub: BroadcastHub,
    _dir: tempfile::TempDir,
}

fn fixture(config: CollectorConfig, forwarder: Arc<dyn LogForwarder>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let logs = Arc::new(LogStore::new(dir.path()));
    let hub = BroadcastHub::new();
    let collector = Arc::new(LogCollector::new(
        logs.clone(),
        hub.clone(),
        forwarder,
        config,
        Arc::new(FakeClock::new()),
    ));
    Fixture { collector, logs, hub, _dir: dir }
}

fn small_batches() -> CollectorConfig {
    CollectorConfig {
        batch_size: 3,
        flush_interval: std::time::Duration::from_millis(30),
        forward_attempts: 2,
    }
}

fn job() -> JobId {
    JobId::from_string("job-collect")
}

fn session() -> SessionId {
    SessionId::from_string("ses-collect")
}

fn chunk(stream: StreamOrigin, line: &str) -> LogChunk {
    LogChunk { stream, line: line.to_string() }
}

/// Forwarder that always fails, counting attempts.
#[derive(Default)]
struct FailingForwarder {
    attempts: Mutex<u32>,
}

#[async_trait]
impl LogForwarder for FailingForwarder {
    async fn forward(&self, _job: &JobId, _lines: &[ty_core::LogLine]) -> Result<(), ForwardError> {
        *self.attempts.lock() += 1;
        Err(ForwardError("aggregator unreachable".to_string()))
    }
}

#[tokio::test]
async fn flushes_on_batch_size_threshold() {
    let f = fixture(small_batches(), Arc::new(NoopForwarder));
    let (tx, rx) = mpsc::channel(16);
    let collector = f.collector.clone();
    let task = tokio::spawn(async move { collector.run(&job(), &session(), rx).await });

    for i in 0..3 {
        tx.send(chunk(StreamOrigin::Stdout, &format!("line {i}"))).await.unwrap();
    }

    // Batch size reached: the flush must happen while the stream is open
    for _ in 0..100 {
        if f.logs.read(&job()).unwrap().len() == 3 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(f.logs.read(&job()).unwrap().len(), 3);

    drop(tx);
    task.await.unwrap();
}

#[tokio::test]
async fn flushes_on_idle_timeout() {
    let f = fixture(small_batches(), Arc::new(NoopForwarder));
    let (tx, rx) = mpsc::channel(16);
    let collector = f.collector.clone();
    let task = tokio::spawn(async move { collector.run(&job(), &session(), rx).await });

    // One line, below the batch threshold
    tx.send(chunk(StreamOrigin::Stdout, "lonely line")).await.unwrap();

    for _ in 0..100 {
        if !f.logs.read(&job()).unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(f.logs.read(&job()).unwrap().len(), 1);

    drop(tx);
    task.await.unwrap();
}

#[tokio::test]
async fn stream_end_flushes_the_remainder() {
    let f = fixture(small_batches(), Arc::new(NoopForwarder));
    let (tx, rx) = mpsc::channel(16);

    tx.send(chunk(StreamOrigin::Stdout, "a")).await.unwrap();
    tx.send(chunk(StreamOrigin::Stderr, "b")).await.unwrap();
    drop(tx);

    f.collector.run(&job(), &session(), rx).await;

    let lines = f.logs.read(&job()).unwrap();
    assert_eq!(lines.len(), 2);
}

#[tokio::test]
async fn interleaved_streams_keep_arrival_order() {
    let f = fixture(small_batches(), Arc::new(NoopForwarder));
    let (tx, rx) = mpsc::channel(16);

    tx.send(chunk(StreamOrigin::Stdout, "out 1")).await.unwrap();
    tx.send(chunk(StreamOrigin::Stderr, "err 1")).await.unwrap();
    tx.send(chunk(StreamOrigin::Stdout, "out 2")).await.unwrap();
    drop(tx);

    f.collector.run(&job(), &session(), rx).await;

    let lines = f.logs.read(&job()).unwrap();
    assert_eq!(lines.iter().map(|l| l.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(lines[0].stream, StreamOrigin::Stdout);
    assert_eq!(lines[1].stream, StreamOrigin::Stderr);
    assert_eq!(lines[2].line, "out 2");
}

#[tokio::test]
async fn log_events_reach_hub_subscribers() {
    let f = fixture(small_batches(), Arc::new(NoopForwarder));
    let mut subscription = f.hub.subscribe_job(&job());
    let (tx, rx) = mpsc::channel(16);

    tx.send(chunk(StreamOrigin::Stdout, "visible")).await.unwrap();
    drop(tx);
    f.collector.run(&job(), &session(), rx).await;

    match subscription.next().await.unwrap() {
        ty_protocol::StreamEvent::Log { lines, .. } => {
            assert_eq!(lines[0].line, "visible");
        }
        other => panic!("expected log event, got {:?}", other),
    }
}

#[tokio::test]
async fn forwarder_failure_never_blocks_the_primary_write() {
    let forwarder = Arc::new(FailingForwarder::default());
    let f = fixture(small_batches(), forwarder.clone());
    let (tx, rx) = mpsc::channel(16);

    tx.send(chunk(StreamOrigin::Stdout, "kept")).await.unwrap();
    drop(tx);
    f.collector.run(&job(), &session(), rx).await;

    // Durable write happened despite the forwarder failing every attempt
    assert_eq!(f.logs.read(&job()).unwrap().len(), 1);
    // Bounded retry: exactly forward_attempts tries, then the batch dropped
    assert_eq!(*forwarder.attempts.lock(), 2);
}
