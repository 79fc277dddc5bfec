// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core configuration loaded from an optional TOML file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Workspace-wide tunables for the scheduler core.
///
/// Every field has a default; a missing config file is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Base directory for durable state (order database).
    pub data_dir: PathBuf,
    /// Base directory for per-order log files.
    pub log_dir: PathBuf,
    /// Per-queue admission cap used by the dispatcher's refill loop.
    pub queue_capacity: usize,
    /// Default retry budget for enqueued jobs (must be at least 1).
    pub retry_attempts: u32,
    /// Scheduler chatter verbosity, 0 (quiet) through 5.
    pub debug: u8,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("convoy");
        Self {
            log_dir: base.join("logs"),
            data_dir: base,
            queue_capacity: 100,
            retry_attempts: 1,
            debug: 0,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
