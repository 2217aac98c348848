// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted backend for supervisor and engine tests.

use crate::{
    BackendError, BackendEvent, BackendHandle, ExecutionBackend, LogChunk, TerminalStatus,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use ty_core::{BackendKind, JobDescriptor, JobId, StreamOrigin};

#[derive(Default)]
struct FakeState {
    launch_error: Option<String>,
    monitor_failures: u32,
    send_active: bool,
    started: Vec<JobId>,
    cancels: Vec<String>,
    resolvers: HashMap<String, watch::Sender<Option<TerminalStatus>>>,
    waiters: HashMap<String, watch::Receiver<Option<TerminalStatus>>>,
    log_senders: HashMap<String, mpsc::Sender<LogChunk>>,
}

/// Test double: terminal outcomes are resolved by the test, monitor errors
/// and launch failures can be scripted, and every cancel is recorded.
#[derive(Clone)]
pub struct FakeBackend {
    kind: BackendKind,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self { kind: BackendKind::LocalProcess, state: Arc::new(Mutex::new(FakeState::default())) }
    }

    /// Every `start` call fails with this message.
    pub fn with_launch_error(self, message: impl Into<String>) -> Self {
        self.state.lock().launch_error = Some(message.into());
        self
    }

    /// The first `n` monitor calls fail with `Unreachable`.
    pub fn with_monitor_failures(self, n: u32) -> Self {
        self.state.lock().monitor_failures = n;
        self
    }

    /// Monitor sends `Active` before waiting for the terminal outcome.
    pub fn with_active_signal(self) -> Self {
        self.state.lock().send_active = true;
        self
    }

    fn handle_for(id: &JobId) -> String {
        format!("fake:{}", id)
    }

    /// Deliver the terminal outcome for a job's monitor.
    pub fn resolve(&self, id: &JobId, status: TerminalStatus) {
        let state = self.state.lock();
        if let Some(tx) = state.resolvers.get(&Self::handle_for(id)) {
            let _ = tx.send(Some(status));
        }
    }

    /// Push a line onto the job's log stream (after `logs` was attached).
    pub fn push_line(&self, id: &JobId, line: impl Into<String>) {
        let state = self.state.lock();
        if let Some(tx) = state.log_senders.get(&Self::handle_for(id)) {
            let _ = tx.try_send(LogChunk { stream: StreamOrigin::Stdout, line: line.into() });
        }
    }

    /// Drop the job's log sender, ending the collector's stream.
    pub fn close_logs(&self, id: &JobId) {
        self.state.lock().log_senders.remove(&Self::handle_for(id));
    }

    pub fn started_jobs(&self) -> Vec<JobId> {
        self.state.lock().started.clone()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.state.lock().cancels.clone()
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn start(&self, descriptor: &JobDescriptor) -> Result<BackendHandle, BackendError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.launch_error {
            return Err(BackendError::LaunchFailed(message.clone()));
        }
        let handle = Self::handle_for(&descriptor.id);
        let (tx, rx) = watch::channel(None);
        state.started.push(descriptor.id.clone());
        state.resolvers.insert(handle.clone(), tx);
        state.waiters.insert(handle.clone(), rx);
        Ok(BackendHandle::new(handle))
    }

    async fn monitor(
        &self,
        handle: &BackendHandle,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<TerminalStatus, BackendError> {
        let (mut rx, send_active) = {
            let mut state = self.state.lock();
            if state.monitor_failures > 0 {
                state.monitor_failures -= 1;
                return Err(BackendError::Unreachable("scripted monitor failure".to_string()));
            }
            let rx = state
                .waiters
                .get(handle.as_str())
                .cloned()
                .ok_or_else(|| BackendError::UnknownHandle(handle.to_string()))?;
            (rx, state.send_active)
        };

        if send_active {
            let _ = events.send(BackendEvent::Active).await;
        }

        loop {
            if let Some(status) = rx.borrow().clone() {
                return Ok(status);
            }
            if rx.changed().await.is_err() {
                return Err(BackendError::Unreachable("fake backend dropped".to_string()));
            }
        }
    }

    async fn cancel(&self, handle: &BackendHandle) -> Result<(), BackendError> {
        self.state.lock().cancels.push(handle.as_str().to_string());
        Ok(())
    }

    async fn logs(&self, handle: &BackendHandle) -> Result<crate::LogStream, BackendError> {
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().log_senders.insert(handle.as_str().to_string(), tx);
        Ok(rx)
    }
}
