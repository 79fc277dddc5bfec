// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compressed point-in-time captures of the order store.
//!
//! A snapshot pins the store contents at a WAL sequence number: on open,
//! the newest snapshot seeds the in-memory state and the WAL replays
//! everything recorded after its `seq`. The write path is crash-safe,
//! and the rename is made durable with a directory fsync before the
//! caller is allowed to truncate the WAL on top of it.

use crate::state::StoreState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// zstd level for the snapshot payload.
const ZSTD_LEVEL: i32 = 3;

/// Errors from snapshot reads and writes
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The order store pinned at one WAL sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Highest WAL sequence folded into `state`.
    pub seq: u64,
    pub state: StoreState,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(seq: u64, state: StoreState) -> Self {
        Self {
            seq,
            state,
            created_at: Utc::now(),
        }
    }

    /// Write the snapshot durably.
    ///
    /// Ordering: staging file → file fsync → rename → parent-directory
    /// fsync. A crash at any point leaves either the previous snapshot
    /// or the new one, never a torn file — and the rename itself is on
    /// disk before [`WalDb::checkpoint`](crate::WalDb::checkpoint) may
    /// truncate the WAL behind it.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let payload = zstd::encode_all(serde_json::to_vec(self)?.as_slice(), ZSTD_LEVEL)?;

        let staging = path.with_extension("tmp");
        {
            let mut file = File::create(&staging)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }

        fs::rename(&staging, path)?;
        sync_parent_dir(path)?;
        Ok(())
    }

    /// Read a snapshot back, tolerating absence and damage.
    ///
    /// A missing file yields `Ok(None)`. A file that fails to decompress
    /// or decode is parked aside (see [`quarantine_path`]) and also
    /// yields `Ok(None)`, leaving recovery to WAL replay.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let payload = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let decoded = zstd::decode_all(payload.as_slice())
            .map_err(SnapshotError::Io)
            .and_then(|json| serde_json::from_slice(&json).map_err(SnapshotError::Encode));

        match decoded {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                let parked = quarantine_path(path);
                warn!(
                    error = %e,
                    path = %path.display(),
                    parked = %parked.display(),
                    "unreadable snapshot parked, recovering from WAL replay",
                );
                fs::rename(path, &parked)?;
                Ok(None)
            }
        }
    }
}

/// fsync the directory containing `path`, so a completed rename is
/// durable rather than queued metadata.
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

/// How many damaged files are kept parked beside the live one.
const PARKED_COPIES: u32 = 3;

/// Pick the `.bak` slot for a damaged file, aging older parked copies
/// out: the newest takes `.bak`, earlier ones shift to `.bak.2` and
/// `.bak.3`, and anything past that is deleted.
pub(crate) fn quarantine_path(path: &Path) -> PathBuf {
    let slot = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let _ = fs::remove_file(slot(PARKED_COPIES));
    for n in (1..PARKED_COPIES).rev() {
        let older = slot(n);
        if older.exists() {
            let _ = fs::rename(&older, slot(n + 1));
        }
    }
    slot(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
