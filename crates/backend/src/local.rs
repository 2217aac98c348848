// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local process backend: runs the worker as a child of the orchestrator.

use crate::{
    BackendError, BackendEvent, BackendHandle, ExecutionBackend, LogChunk, TerminalStatus,
    CALLBACK_URL_ENV, JOB_ID_ENV,
};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use ty_core::{BackendKind, JobDescriptor, JobFailure, StreamOrigin};

/// Delay between SIGTERM on cancel and the SIGKILL escalation.
const KILL_GRACE: Duration = Duration::from_secs(10);

const LOG_CHANNEL_CAPACITY: usize = 256;

struct ProcEntry {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    pid: i32,
    cancelled: bool,
}

/// Runs each worker as a child process with piped stdio.
///
/// The process exit code is the terminal status: 0 is success, anything
/// else (including death by signal) is "process exited abnormally" unless
/// this backend itself delivered the signal for a cancel request.
pub struct LocalProcessBackend {
    procs: Arc<Mutex<HashMap<String, ProcEntry>>>,
    grace: Duration,
}

impl LocalProcessBackend {
    pub fn new() -> Self {
        Self { procs: Arc::new(Mutex::new(HashMap::new())), grace: KILL_GRACE }
    }

    /// Shorten the SIGTERM -> SIGKILL escalation window (tests).
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

impl Default for LocalProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for LocalProcessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalProcess
    }

    async fn start(&self, descriptor: &JobDescriptor) -> Result<BackendHandle, BackendError> {
        let (program, args) = descriptor
            .command
            .split_first()
            .ok_or_else(|| BackendError::LaunchFailed("empty worker command".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(descriptor.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(JOB_ID_ENV, descriptor.id.as_str())
            .env(CALLBACK_URL_ENV, &descriptor.callback_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| BackendError::LaunchFailed(format!("spawn {}: {}", program, e)))?;

        let pid = child.id().unwrap_or_default() as i32;
        let handle = BackendHandle::new(format!("pid:{}", pid));
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        tracing::info!(job_id = %descriptor.id, pid, "worker process spawned");

        self.procs.lock().insert(
            handle.as_str().to_string(),
            ProcEntry { child: Some(child), stdout, stderr, pid, cancelled: false },
        );
        Ok(handle)
    }

    async fn monitor(
        &self,
        handle: &BackendHandle,
        events: mpsc::Sender<BackendEvent>,
    ) -> Result<TerminalStatus, BackendError> {
        let mut child = self
            .procs
            .lock()
            .get_mut(handle.as_str())
            .and_then(|entry| entry.child.take())
            .ok_or_else(|| BackendError::UnknownHandle(handle.to_string()))?;

        // A spawned child is executing by definition
        let _ = events.send(BackendEvent::Active).await;

        let status = child.wait().await;

        let cancelled = self
            .procs
            .lock()
            .remove(handle.as_str())
            .map(|entry| entry.cancelled)
            .unwrap_or_default();

        let status = status.map_err(|e| BackendError::Unreachable(format!("wait: {}", e)))?;

        let terminal = match status.code() {
            Some(0) => TerminalStatus::Succeeded,
            _ if cancelled => TerminalStatus::Cancelled,
            Some(code) => TerminalStatus::Failed(JobFailure::crashed(
                "process exited abnormally",
                Some(format!("exit code {}", code)),
            )),
            None => TerminalStatus::Failed(JobFailure::crashed(
                "process exited abnormally",
                Some("terminated by signal".to_string()),
            )),
        };
        tracing::debug!(handle = %handle, ?terminal, "worker process exited");
        Ok(terminal)
    }

    async fn cancel(&self, handle: &BackendHandle) -> Result<(), BackendError> {
        let pid = {
            let mut procs = self.procs.lock();
            match procs.get_mut(handle.as_str()) {
                Some(entry) => {
                    entry.cancelled = true;
                    entry.pid
                }
                // Already terminated — cancel is a no-op
                None => return Ok(()),
            }
        };

        tracing::info!(handle = %handle, "cancelling worker process");
        // ESRCH means the process is already gone, which is fine
        let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);

        let grace = self.grace;
        let procs = Arc::clone(&self.procs);
        let key = handle.as_str().to_string();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if procs.lock().contains_key(&key) {
                tracing::warn!(handle = %key, "worker ignored SIGTERM, escalating to SIGKILL");
                let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
            }
        });
        Ok(())
    }

    async fn logs(&self, handle: &BackendHandle) -> Result<crate::LogStream, BackendError> {
        let (stdout, stderr) = {
            let mut procs = self.procs.lock();
            let entry = procs
                .get_mut(handle.as_str())
                .ok_or_else(|| BackendError::UnknownHandle(handle.to_string()))?;
            (entry.stdout.take(), entry.stderr.take())
        };

        if stdout.is_none() && stderr.is_none() {
            return Err(BackendError::OutputTaken(handle.to_string()));
        }

        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        if let Some(out) = stdout {
            spawn_reader(out, StreamOrigin::Stdout, tx.clone());
        }
        if let Some(err) = stderr {
            spawn_reader(err, StreamOrigin::Stderr, tx);
        }
        Ok(rx)
    }
}

fn spawn_reader<R>(reader: R, stream: StreamOrigin, tx: mpsc::Sender<LogChunk>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(LogChunk { stream, line }).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "worker output stream closed");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
