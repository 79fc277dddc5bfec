// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Order database: the durable storage contract and its implementations.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::{StoreRecord, StoreState};
use crate::wal::{Wal, WalError};
use convoy_core::{OrderId, OrderRecord, TaskId, TaskRecord, TaskStatus};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in order database operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Closed-ness filter for task counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    Any,
    Open,
    Closed,
}

impl TaskFilter {
    fn closed(self) -> Option<bool> {
        match self {
            TaskFilter::Any => None,
            TaskFilter::Open => Some(false),
            TaskFilter::Closed => Some(true),
        }
    }
}

/// Durable storage for orders and tasks.
///
/// `mark_tasks` is an atomic select-and-update: concurrent refillers
/// against the same queue partition the returned rows disjointly.
pub trait OrderDb: Send + Sync {
    fn save_order(&self, order: &OrderRecord) -> Result<(), StorageError>;
    fn save_task(&self, task: &TaskRecord) -> Result<(), StorageError>;
    fn get_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, StorageError>;
    fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, StorageError>;
    fn count_tasks(&self, order_id: &OrderId, filter: TaskFilter) -> Result<usize, StorageError>;
    fn mark_tasks(
        &self,
        new_status: TaskStatus,
        limit: usize,
        queue_name: &str,
        status: TaskStatus,
    ) -> Result<Vec<TaskRecord>, StorageError>;
    /// Startup crash recovery: close orders stranded mid-admission and
    /// reset in-flight tasks to `go`. Returns the number of closed orders.
    fn close_open_orders(&self, now_ms: u64) -> Result<usize, StorageError>;
}

struct WalDbInner {
    state: StoreState,
    wal: Wal,
}

impl WalDbInner {
    fn persist(&mut self, record: StoreRecord) -> Result<(), WalError> {
        self.state.apply_record(&record);
        self.wal.append(&record)?;
        if self.wal.needs_flush() {
            self.wal.flush()?;
        }
        Ok(())
    }
}

/// WAL-backed order database.
///
/// Every save is applied to the in-memory state and appended to the WAL
/// (group commit, ~10ms durability window). `checkpoint()` writes a
/// compressed snapshot and truncates the log.
pub struct WalDb {
    inner: Mutex<WalDbInner>,
    snapshot_path: PathBuf,
}

impl WalDb {
    /// Open (or create) the database in `dir`.
    ///
    /// Recovery: load the snapshot if present, then replay WAL entries
    /// recorded after its sequence number.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        let snapshot_path = dir.join("orders.snapshot");
        let wal_path = dir.join("orders.wal");

        let (mut state, seq) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (StoreState::default(), 0),
        };

        let mut wal = Wal::open(&wal_path)?;
        for entry in wal.entries_after(seq)? {
            state.apply_record(&entry.record);
        }

        Ok(Self {
            inner: Mutex::new(WalDbInner { state, wal }),
            snapshot_path,
        })
    }

    /// Force buffered WAL entries to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.inner.lock().wal.flush()?;
        Ok(())
    }

    /// Write a snapshot of the current state and truncate the WAL.
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.wal.flush()?;
        let seq = inner.wal.write_seq();
        Snapshot::new(seq, inner.state.clone()).save(&self.snapshot_path)?;
        inner.wal.truncate_through(seq)?;
        Ok(())
    }
}

impl Drop for WalDb {
    fn drop(&mut self) {
        if let Err(e) = self.inner.lock().wal.flush() {
            tracing::warn!(error = %e, "failed to flush WAL on drop");
        }
    }
}

impl OrderDb for WalDb {
    fn save_order(&self, order: &OrderRecord) -> Result<(), StorageError> {
        self.inner.lock().persist(StoreRecord::Order(order.clone()))?;
        Ok(())
    }

    fn save_task(&self, task: &TaskRecord) -> Result<(), StorageError> {
        self.inner.lock().persist(StoreRecord::Task(task.clone()))?;
        Ok(())
    }

    fn get_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, StorageError> {
        Ok(self.inner.lock().state.get_order(id).cloned())
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, StorageError> {
        Ok(self.inner.lock().state.get_task(id).cloned())
    }

    fn count_tasks(&self, order_id: &OrderId, filter: TaskFilter) -> Result<usize, StorageError> {
        Ok(self
            .inner
            .lock()
            .state
            .count_tasks(order_id, filter.closed()))
    }

    fn mark_tasks(
        &self,
        new_status: TaskStatus,
        limit: usize,
        queue_name: &str,
        status: TaskStatus,
    ) -> Result<Vec<TaskRecord>, StorageError> {
        let mut inner = self.inner.lock();
        let updated = inner
            .state
            .mark_tasks(new_status, limit, queue_name, status);
        for task in &updated {
            inner.wal.append(&StoreRecord::Task(task.clone()))?;
        }
        if inner.wal.needs_flush() {
            inner.wal.flush()?;
        }
        Ok(updated)
    }

    fn close_open_orders(&self, now_ms: u64) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock();
        let changed = inner.state.recover_open_work(now_ms);
        let closed = changed
            .iter()
            .filter(|r| matches!(r, StoreRecord::Order(_)))
            .count();
        for record in &changed {
            inner.wal.append(record)?;
        }
        inner.wal.flush()?;
        Ok(closed)
    }
}

/// In-memory order database for tests and embedders that do not need
/// durability.
#[derive(Default)]
pub struct MemoryDb {
    state: Mutex<StoreState>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderDb for MemoryDb {
    fn save_order(&self, order: &OrderRecord) -> Result<(), StorageError> {
        self.state
            .lock()
            .apply_record(&StoreRecord::Order(order.clone()));
        Ok(())
    }

    fn save_task(&self, task: &TaskRecord) -> Result<(), StorageError> {
        self.state
            .lock()
            .apply_record(&StoreRecord::Task(task.clone()));
        Ok(())
    }

    fn get_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, StorageError> {
        Ok(self.state.lock().get_order(id).cloned())
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, StorageError> {
        Ok(self.state.lock().get_task(id).cloned())
    }

    fn count_tasks(&self, order_id: &OrderId, filter: TaskFilter) -> Result<usize, StorageError> {
        Ok(self.state.lock().count_tasks(order_id, filter.closed()))
    }

    fn mark_tasks(
        &self,
        new_status: TaskStatus,
        limit: usize,
        queue_name: &str,
        status: TaskStatus,
    ) -> Result<Vec<TaskRecord>, StorageError> {
        Ok(self
            .state
            .lock()
            .mark_tasks(new_status, limit, queue_name, status))
    }

    fn close_open_orders(&self, now_ms: u64) -> Result<usize, StorageError> {
        let changed = self.state.lock().recover_open_work(now_ms);
        Ok(changed
            .iter()
            .filter(|r| matches!(r, StoreRecord::Order(_)))
            .count())
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
