// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live task entity with its event surfaces.

use convoy_core::{Clock, OrderId, Signal, TaskId, TaskRecord, TaskStatus};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// A task under dispatch.
///
/// Carries three signals: `go_event` (the owning service marked the task
/// ready), `changed_event` (any status change, used for persistence) and
/// `closed_event` (the task reached a terminal state).
pub struct Task {
    record: Mutex<TaskRecord>,
    clock: Arc<dyn Clock>,
    me: Weak<Task>,
    go: Signal<Arc<Task>>,
    changed: Signal<Arc<Task>>,
    closed: Signal<Arc<Task>>,
}

impl Task {
    pub(crate) fn new(record: TaskRecord, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            record: Mutex::new(record),
            clock,
            me: me.clone(),
            go: Signal::new(),
            changed: Signal::new(),
            closed: Signal::new(),
        })
    }

    pub fn id(&self) -> TaskId {
        self.record.lock().id.clone()
    }

    pub fn order_id(&self) -> OrderId {
        self.record.lock().order_id.clone()
    }

    pub fn name(&self) -> String {
        self.record.lock().name.clone()
    }

    pub fn queue_name(&self) -> String {
        self.record.lock().queue_name.clone()
    }

    /// Symbolic function name, resolved by the owning service at run time.
    pub fn func_name(&self) -> String {
        self.record.lock().func_name.clone()
    }

    pub fn status(&self) -> TaskStatus {
        self.record.lock().status
    }

    /// Snapshot of the persisted form.
    pub fn record(&self) -> TaskRecord {
        self.record.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.record.lock().is_closed()
    }

    pub fn go_event(&self) -> &Signal<Arc<Task>> {
        &self.go
    }

    pub fn changed_event(&self) -> &Signal<Arc<Task>> {
        &self.changed
    }

    pub fn closed_event(&self) -> &Signal<Arc<Task>> {
        &self.closed
    }

    /// Set a non-terminal status and fire the changed event.
    pub fn set_status(&self, status: TaskStatus) {
        {
            self.record.lock().status = status;
        }
        self.emit_changed();
    }

    /// Mark the task ready for dispatch: status `go`, then the go event.
    pub fn go(&self) {
        self.set_status(TaskStatus::Go);
        self.emit(&self.go);
    }

    /// Close with a terminal status. Idempotent; events fire only on the
    /// first close, changed before closed.
    pub fn close(&self, status: TaskStatus) {
        let already_closed = {
            let mut record = self.record.lock();
            let closed = record.is_closed();
            if !closed {
                record.close(status, self.clock.epoch_ms());
            }
            closed
        };
        if !already_closed {
            self.emit_changed();
            self.emit(&self.closed);
        }
    }

    /// Close successfully.
    pub fn completed(&self) {
        self.close(TaskStatus::Completed);
    }

    fn emit_changed(&self) {
        self.emit(&self.changed);
    }

    fn emit(&self, signal: &Signal<Arc<Task>>) {
        if let Some(me) = self.me.upgrade() {
            signal.emit(&me);
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record = self.record.lock();
        f.debug_struct("Task")
            .field("id", &record.id)
            .field("name", &record.name)
            .field("queue", &record.queue_name)
            .field("status", &record.status)
            .finish()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
