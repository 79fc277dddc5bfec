// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! convoy-queue: concurrent in-memory work queue with bounded parallelism,
//! named-job deduplication, priority insertion and per-job retry.

pub mod cancel;
pub mod collection;
pub mod error;
pub mod events;
pub mod job;
pub mod queue;
mod scheduler;
pub mod spawner;
pub mod work;

pub use cancel::CancelToken;
pub use collection::JobCollection;
pub use error::QueueError;
pub use events::QueueEvents;
pub use job::{Job, JobId, JobOutcome, JobSpec};
pub use queue::{CancelOutcome, QueueConfig, WorkQueue};
pub use spawner::{ProcessSpawner, Spawner, ThreadSpawner, WorkerHandle};
pub use work::{ExecSpec, JobContext, Work, WorkError};
