// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The contract between the dispatcher and user-supplied services.

use crate::dispatcher::OrderDispatcher;
use crate::error::DispatchError;
use crate::order::Order;
use crate::order_logger::OrderLogger;
use crate::task::Task;
use convoy_storage::OrderDb;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by service callbacks.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("{0}")]
    Failed(String),
}

impl ServiceError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A user-supplied order handler.
///
/// `check` is a fast, synchronous admission test on the daemon's thread.
/// `enter` may create tasks (through [`ServiceContext::create_task`]) and
/// runs on a helper thread. `run_function` executes a task's symbolic
/// function inside a worker.
pub trait Service: Send + Sync {
    /// Unique key the dispatcher routes orders by.
    fn name(&self) -> &str;

    fn check(&self, ctx: &ServiceContext<'_>, order: &Arc<Order>) -> Result<bool, ServiceError>;

    fn enter(&self, ctx: &ServiceContext<'_>, order: &Arc<Order>) -> Result<bool, ServiceError>;

    fn run_function(
        &self,
        func_name: &str,
        ctx: &ServiceContext<'_>,
        order: &Arc<Order>,
        task: &Arc<Task>,
    ) -> Result<(), ServiceError>;
}

/// Dispatcher capabilities handed to service callbacks.
///
/// Services hold no reference back to their dispatcher; everything they
/// may do to it flows through this context.
pub struct ServiceContext<'a> {
    dispatcher: &'a Arc<OrderDispatcher>,
}

impl<'a> ServiceContext<'a> {
    pub(crate) fn new(dispatcher: &'a Arc<OrderDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Create a task bound to `queue_name`, wired for persistence and
    /// dispatch. The service marks it ready with [`Task::go`].
    pub fn create_task(
        &self,
        order: &Arc<Order>,
        name: impl Into<String>,
        queue_name: &str,
        func_name: impl Into<String>,
    ) -> Result<Arc<Task>, DispatchError> {
        self.dispatcher.create_task(order, name, queue_name, func_name)
    }

    /// File logger inside the order's log directory.
    pub fn get_logger(&self, order: &Arc<Order>, name: &str) -> Arc<OrderLogger> {
        self.dispatcher.get_logger(order, name)
    }

    /// Log a message against the order through the dispatcher's logs.
    pub fn log(&self, order: &Arc<Order>, message: &str) {
        self.dispatcher.log(order, message);
    }

    pub fn db(&self) -> &Arc<dyn OrderDb> {
        self.dispatcher.db()
    }
}
