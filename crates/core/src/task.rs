// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record and status.

use crate::order::OrderId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a task.
    pub struct TaskId;
}

/// Lifecycle status of a task.
///
/// `new → go → loading → queued → in-progress → completed | internal-error`.
/// Only the dispatcher's refill path moves a task to `queued`; only a
/// worker moves it to `in-progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    New,
    Go,
    Loading,
    Queued,
    InProgress,
    Completed,
    InternalError,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::InternalError)
    }

    /// True for states that mean the task was claimed by a scheduler run
    /// which is no longer alive after a restart.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TaskStatus::Loading | TaskStatus::Queued | TaskStatus::InProgress
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::New => "new",
            TaskStatus::Go => "go",
            TaskStatus::Loading => "loading",
            TaskStatus::Queued => "queued",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::InternalError => "internal-error",
        };
        write!(f, "{s}")
    }
}

/// Persisted form of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub order_id: OrderId,
    pub name: String,
    /// Work queue this task is bound to.
    pub queue_name: String,
    /// Symbolic function name, resolved by the owning service at run time.
    pub func_name: String,
    pub status: TaskStatus,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at_ms: Option<u64>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        order_id: OrderId,
        name: impl Into<String>,
        queue_name: impl Into<String>,
        func_name: impl Into<String>,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            order_id,
            name: name.into(),
            queue_name: queue_name.into(),
            func_name: func_name.into(),
            status: TaskStatus::New,
            created_at_ms,
            closed_at_ms: None,
        }
    }

    /// Set a terminal status and stamp the closed timestamp. Idempotent.
    pub fn close(&mut self, status: TaskStatus, now_ms: u64) {
        if self.closed_at_ms.is_none() {
            self.status = status;
            self.closed_at_ms = Some(now_ms);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at_ms.is_some()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
