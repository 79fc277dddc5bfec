// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for queue operations

use thiserror::Error;

/// Errors surfaced by the work queue facade.
///
/// These are programmer errors: they fail fast and mutate no state.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is shut down")]
    ShutDown,
    #[error("retry budget must be at least 1")]
    InvalidAttempts,
    #[error("operation requires a job name")]
    NameRequired,
    #[error("max_workers must be at least 1")]
    InvalidWorkerCount,
    #[error("failed to start scheduler thread: {0}")]
    Scheduler(String),
}
