// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders and proptest strategies shared with other crates' tests.

use crate::descriptor::{BackendKind, JobDescriptor};
use crate::id::{JobId, SessionId};

/// A local-process descriptor with fixed IDs, suitable as a builder default.
pub fn descriptor() -> JobDescriptor {
    JobDescriptor::builder(
        JobId::from_string("job-test0000000000000000"),
        SessionId::from_string("ses-test0000000000000000"),
        BackendKind::LocalProcess,
    )
    .command(vec!["true".to_string()])
    .callback_url("http://127.0.0.1:0/api/v1/callbacks/job-test0000000000000000")
    .build()
}

/// A descriptor with a fresh random job id under the given session.
pub fn descriptor_for(session: &SessionId) -> JobDescriptor {
    let id = JobId::new();
    let callback_url = format!("http://127.0.0.1:0/api/v1/callbacks/{id}");
    JobDescriptor::builder(id, session.clone(), BackendKind::LocalProcess)
        .command(vec!["true".to_string()])
        .callback_url(callback_url)
        .build()
}

pub mod strategies {
    use crate::job::JobStatus;
    use proptest::prelude::*;

    /// Any job status, uniformly.
    pub fn arb_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Pending),
            Just(JobStatus::Starting),
            Just(JobStatus::Running),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
            Just(JobStatus::Cancelled),
        ]
    }

    /// A random sequence of attempted transitions, for interleaving tests.
    pub fn arb_status_sequence() -> impl Strategy<Value = Vec<JobStatus>> {
        proptest::collection::vec(arb_status(), 0..12)
    }
}
