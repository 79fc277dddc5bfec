// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the dispatch layer

use crate::service::ServiceError;
use convoy_core::{OrderId, TaskId};
use convoy_queue::QueueError;
use convoy_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the order dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("unknown queue: {0}")]
    UnknownQueue(String),
    #[error("no service registered for '{0}'")]
    ServiceNotFound(String),
    #[error("order {order}: check failed")]
    Check {
        order: OrderId,
        #[source]
        source: ServiceError,
    },
    #[error("order {order}: enter failed")]
    Enter {
        order: OrderId,
        #[source]
        source: ServiceError,
    },
    #[error("task {task}: function '{func}' failed")]
    Function {
        task: TaskId,
        func: String,
        #[source]
        source: ServiceError,
    },
    #[error("failed to spawn helper thread: {0}")]
    Thread(String),
}
