// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE subscription streams.
//!
//! Subscriptions are ephemeral — nothing is replayed. A client must fetch
//! the current record first, then attach here; a `behind` item on the
//! stream means it lagged and must re-fetch before trusting live events.

use crate::server::AppState;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use ty_core::{JobId, SessionId};
use ty_engine::HubSubscription;

pub(crate) async fn job_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.supervisor.hub().subscribe_job(&JobId::from_string(id));
    sse_stream(subscription)
}

pub(crate) async fn session_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription =
        state.supervisor.hub().subscribe_session(&SessionId::from_string(id));
    sse_stream(subscription)
}

fn sse_stream(
    subscription: HubSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = futures_util::stream::unfold(subscription, |mut subscription| async move {
        loop {
            let event = subscription.next().await?;
            match Event::default().json_data(&event) {
                Ok(sse_event) => return Some((Ok::<_, Infallible>(sse_event), subscription)),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unserializable stream event");
                }
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
