// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP protocol types for the Trainyard daemon.
//!
//! Shared between the daemon, the isolated worker (callback payloads) and
//! presentation clients (submission, query, subscription stream). Workers
//! are untrusted and version-skewed, so callback payloads tolerate unknown
//! fields and default every optional one.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod callback;
mod detail;
mod stream;
mod submit;

pub use callback::{
    CallbackOutcome, CompletionCallback, ProgressCallback, StartedCallback, WorkerError,
};
pub use detail::JobDetail;
pub use stream::StreamEvent;
pub use submit::{SubmitJobRequest, SubmitJobResponse};
