// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker factories: how a job's payload gets an isolated execution context.

use crate::job::Job;
use crate::work::{self, WorkError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Completion callback handed to a spawner; invoked exactly once with the
/// failure cause (`None` on success).
pub type ExitFn = Box<dyn FnOnce(Option<WorkError>) + Send + 'static>;

/// Errors that can occur while launching a worker
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn worker thread: {0}")]
    Thread(String),
    #[error("failed to spawn worker process: {0}")]
    Process(String),
}

enum HandleKind {
    Thread(JoinHandle<()>),
    Process { pid: u32, reaper: JoinHandle<()> },
}

/// Handle to a launched worker, used for liveness tracking.
pub struct WorkerHandle {
    name: String,
    kind: HandleKind,
}

impl WorkerHandle {
    fn thread(name: String, handle: JoinHandle<()>) -> Self {
        Self {
            name,
            kind: HandleKind::Thread(handle),
        }
    }

    fn process(name: String, pid: u32, reaper: JoinHandle<()>) -> Self {
        Self {
            name,
            kind: HandleKind::Process { pid, reaper },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process id of the worker, when it runs out of process.
    pub fn pid(&self) -> Option<u32> {
        match &self.kind {
            HandleKind::Thread(_) => None,
            HandleKind::Process { pid, .. } => Some(*pid),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.kind {
            HandleKind::Thread(handle) => handle.is_finished(),
            HandleKind::Process { reaper, .. } => reaper.is_finished(),
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("pid", &self.pid())
            .finish()
    }
}

/// Launches a job's work in an isolated worker.
///
/// Contract: `on_exit` is invoked exactly once — with the failure cause or
/// `None` on success — even when the spawn itself fails (the returned
/// `Err` is then informational only).
pub trait Spawner: Send + Sync + 'static {
    fn spawn(&self, job: &Job, on_exit: ExitFn) -> Result<WorkerHandle, SpawnError>;
}

/// Runs each job on a dedicated OS thread. Shared memory, light weight;
/// callable panics are contained by the work layer.
#[derive(Clone, Copy, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: &Job, on_exit: ExitFn) -> Result<WorkerHandle, SpawnError> {
        let worker_name = job.worker_name();
        let slot: Arc<Mutex<Option<ExitFn>>> = Arc::new(Mutex::new(Some(on_exit)));
        let slot_in = Arc::clone(&slot);
        let job_in = job.clone();

        let result = thread::Builder::new()
            .name(worker_name.clone())
            .spawn(move || {
                let outcome = job_in.run_work();
                if let Some(exit) = slot_in.lock().take() {
                    exit(outcome.err());
                }
            });

        match result {
            Ok(handle) => Ok(WorkerHandle::thread(worker_name, handle)),
            Err(e) => {
                if let Some(exit) = slot.lock().take() {
                    exit(Some(WorkError::Spawn(e.to_string())));
                }
                Err(SpawnError::Thread(e.to_string()))
            }
        }
    }
}

/// Runs command jobs as real child processes for fault isolation; a reaper
/// thread waits on the child and honours cancellation by killing it.
///
/// Callable jobs cannot cross a process boundary and fall back to a
/// dedicated thread.
#[derive(Clone, Copy, Default)]
pub struct ProcessSpawner;

impl Spawner for ProcessSpawner {
    fn spawn(&self, job: &Job, on_exit: ExitFn) -> Result<WorkerHandle, SpawnError> {
        let Some(spec) = job.exec_spec() else {
            return ThreadSpawner.spawn(job, on_exit);
        };

        let worker_name = job.worker_name();
        let child = match spec.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                on_exit(Some(WorkError::Spawn(e.to_string())));
                return Err(SpawnError::Process(e.to_string()));
            }
        };
        let pid = child.id();

        let child = Arc::new(Mutex::new(child));
        let child_in = Arc::clone(&child);
        let cancel = job.cancel_token();
        let slot: Arc<Mutex<Option<ExitFn>>> = Arc::new(Mutex::new(Some(on_exit)));
        let slot_in = Arc::clone(&slot);

        let result = thread::Builder::new()
            .name(format!("{worker_name}-reaper"))
            .spawn(move || {
                let outcome = work::wait_child(&child_in, &cancel);
                if let Some(exit) = slot_in.lock().take() {
                    exit(outcome.err());
                }
            });

        match result {
            Ok(reaper) => Ok(WorkerHandle::process(worker_name, pid, reaper)),
            Err(e) => {
                // No reaper will ever wait on the child; reap it here.
                {
                    let mut guard = child.lock();
                    let _ = guard.kill();
                    let _ = guard.wait();
                }
                if let Some(exit) = slot.lock().take() {
                    exit(Some(WorkError::Spawn(e.to_string())));
                }
                Err(SpawnError::Process(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
