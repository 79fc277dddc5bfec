// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized order/task state from WAL replay

use convoy_core::{OrderId, OrderRecord, TaskId, TaskRecord, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A single durable record in the order store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreRecord {
    Order(OrderRecord),
    Task(TaskRecord),
}

/// Materialized state built from replayed store records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreState {
    pub orders: HashMap<String, OrderRecord>,
    pub tasks: HashMap<String, TaskRecord>,
}

impl StoreState {
    /// Apply a record. Upsert semantics: replaying the same record twice
    /// yields the same state as applying it once.
    pub fn apply_record(&mut self, record: &StoreRecord) {
        match record {
            StoreRecord::Order(order) => {
                self.orders.insert(order.id.as_str().to_string(), order.clone());
            }
            StoreRecord::Task(task) => {
                self.tasks.insert(task.id.as_str().to_string(), task.clone());
            }
        }
    }

    pub fn get_order(&self, id: &OrderId) -> Option<&OrderRecord> {
        self.orders.get(id.as_str())
    }

    pub fn get_task(&self, id: &TaskId) -> Option<&TaskRecord> {
        self.tasks.get(id.as_str())
    }

    /// Count tasks of an order, optionally filtered on closed-ness.
    pub fn count_tasks(&self, order_id: &OrderId, closed: Option<bool>) -> usize {
        self.tasks
            .values()
            .filter(|t| &t.order_id == order_id)
            .filter(|t| match closed {
                Some(want) => t.is_closed() == want,
                None => true,
            })
            .count()
    }

    /// Select up to `limit` tasks on `queue_name` in `status`, in creation
    /// order. Ties on the timestamp break on the task id so the result is
    /// deterministic.
    pub fn select_tasks(
        &self,
        queue_name: &str,
        status: TaskStatus,
        limit: usize,
    ) -> Vec<TaskRecord> {
        let mut matches: Vec<&TaskRecord> = self
            .tasks
            .values()
            .filter(|t| t.queue_name == queue_name && t.status == status && !t.is_closed())
            .collect();
        matches.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        matches.into_iter().take(limit).cloned().collect()
    }

    /// Atomically (under the caller's lock) move up to `limit` matching
    /// tasks to `new_status` and return the updated records.
    pub fn mark_tasks(
        &mut self,
        new_status: TaskStatus,
        limit: usize,
        queue_name: &str,
        status: TaskStatus,
    ) -> Vec<TaskRecord> {
        let selected = self.select_tasks(queue_name, status, limit);
        let mut updated = Vec::with_capacity(selected.len());
        for mut task in selected {
            task.status = new_status;
            self.tasks
                .insert(task.id.as_str().to_string(), task.clone());
            updated.push(task);
        }
        updated
    }

    /// Startup normalization after a crash or restart.
    ///
    /// Orders stranded in a transient admission state are closed; their
    /// open tasks are closed with them. Tasks claimed by a dead scheduler
    /// run (loading/queued/in-progress) are reset to `go` so the refill
    /// loop picks them up again.
    ///
    /// Returns every changed record, for the caller to persist.
    pub fn recover_open_work(&mut self, now_ms: u64) -> Vec<StoreRecord> {
        let mut changed = Vec::new();
        let mut closed_orders: HashSet<String> = HashSet::new();

        for order in self.orders.values_mut() {
            if !order.is_closed() && order.status.is_recoverable() {
                order.close(now_ms);
                closed_orders.insert(order.id.as_str().to_string());
                changed.push(StoreRecord::Order(order.clone()));
            }
        }

        for task in self.tasks.values_mut() {
            if task.is_closed() {
                continue;
            }
            if closed_orders.contains(task.order_id.as_str()) {
                task.close(task.status, now_ms);
                changed.push(StoreRecord::Task(task.clone()));
            } else if task.status.is_in_flight() {
                task.status = TaskStatus::Go;
                changed.push(StoreRecord::Task(task.clone()));
            }
        }

        changed
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
