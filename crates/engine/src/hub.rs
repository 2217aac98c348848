// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory publish/subscribe register for live observers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use ty_core::{JobId, SessionId};
use ty_protocol::StreamEvent;

/// Bounded per-key ring; a subscriber that falls further behind than this
/// starts losing the oldest events and is told to resync.
const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HubKey {
    Job(JobId),
    Session(SessionId),
}

/// Pure in-memory pub/sub keyed by job id and by session id.
///
/// Holds no durable state: all subscriptions die with the process, and a
/// reconnecting observer must re-fetch current state from the store before
/// resuming on live events. Publishing never blocks — a slow subscriber
/// only loses its own oldest events ([`StreamEvent::Behind`]).
#[derive(Clone, Default)]
pub struct BroadcastHub {
    channels: Arc<Mutex<HashMap<HubKey, broadcast::Sender<StreamEvent>>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch every event for one job.
    pub fn subscribe_job(&self, id: &JobId) -> HubSubscription {
        self.subscribe(HubKey::Job(id.clone()))
    }

    /// Watch every event for every job owned by a session.
    pub fn subscribe_session(&self, id: &SessionId) -> HubSubscription {
        self.subscribe(HubKey::Session(id.clone()))
    }

    fn subscribe(&self, key: HubKey) -> HubSubscription {
        let mut channels = self.channels.lock();
        let tx = channels.entry(key).or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0);
        HubSubscription { rx: tx.subscribe() }
    }

    /// Fan an event out to job and session subscribers. At-most-once,
    /// best-effort per subscriber.
    pub fn publish(&self, job: &JobId, session: &SessionId, event: StreamEvent) {
        self.send(&HubKey::Job(job.clone()), &event);
        self.send(&HubKey::Session(session.clone()), &event);
    }

    fn send(&self, key: &HubKey, event: &StreamEvent) {
        let mut channels = self.channels.lock();
        if let Some(tx) = channels.get(key) {
            if tx.receiver_count() == 0 {
                // Last subscriber disconnected; drop the ring
                channels.remove(key);
            } else {
                let _ = tx.send(event.clone());
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }
}

/// One subscriber's view of a hub key.
pub struct HubSubscription {
    rx: broadcast::Receiver<StreamEvent>,
}

impl HubSubscription {
    /// Receive the next event.
    ///
    /// Yields [`StreamEvent::Behind`] when this subscriber overflowed its
    /// buffer, meaning it must re-fetch current state before trusting
    /// further events. Returns `None` once the hub side is gone.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Some(StreamEvent::Behind { missed })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
