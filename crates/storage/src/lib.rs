// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! convoy-storage: durable order and task state.
//!
//! The production database is a JSONL write-ahead log replayed into an
//! in-memory state map, checkpointed to a zstd-compressed snapshot.

mod db;
mod snapshot;
mod state;
mod wal;

pub use db::{MemoryDb, OrderDb, StorageError, TaskFilter, WalDb};
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{StoreRecord, StoreState};
pub use wal::{Wal, WalEntry, WalError};
