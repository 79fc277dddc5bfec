// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only logger for per-order log files.

use convoy_core::{format_utc_ms, Clock};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Append-only logger writing to a file inside an order's log directory:
///   `<log_dir>/<service>/<order_id>/<name>`
///
/// Line format: `2026-01-30T08:14:09Z - INFO - message`
///
/// Each append opens, writes, and closes the file. This is safe for the
/// low write frequency of order events. Write failures are reported via
/// tracing and never propagate.
pub struct OrderLogger {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl OrderLogger {
    pub(crate) fn new(path: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self { path, clock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: &str) {
        self.append("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        self.append("WARNING", message);
    }

    pub fn error(&self, message: &str) {
        self.append("ERROR", message);
    }

    fn append(&self, level: &str, message: &str) {
        if let Err(e) = self.write_line(level, message) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to write order log"
            );
        }
    }

    fn write_line(&self, level: &str, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let ts = format_utc_ms(self.clock.epoch_ms());
        writeln!(file, "{} - {} - {}", ts, level, message)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "order_logger_tests.rs"]
mod tests;
