// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Public work queue facade.

use crate::collection::JobCollection;
use crate::error::QueueError;
use crate::events::QueueEvents;
use crate::job::{Job, JobId, JobOutcome, JobSpec};
use crate::scheduler::Scheduler;
use crate::spawner::{Spawner, ThreadSpawner};
use crate::work::WorkError;
use convoy_core::{CoreConfig, Signal};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Tunables for a work queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Concurrency cap for non-force jobs.
    pub max_workers: usize,
    /// Retry budget applied when a job spec does not set one.
    pub default_attempts: u32,
    /// Scheduler chatter verbosity, 0 (quiet) through 5.
    pub debug: u8,
}

impl QueueConfig {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Self::default()
        }
    }

    /// Queue tunables derived from the workspace config.
    pub fn from_core(max_workers: usize, config: &CoreConfig) -> Self {
        Self {
            max_workers,
            default_attempts: config.retry_attempts,
            debug: config.debug,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            default_attempts: 1,
            debug: 0,
        }
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still pending and has been removed.
    Removed,
    /// The job is running; its cancel token was tripped.
    Signalled,
    NotFound,
}

/// A work queue: bounded-concurrency scheduler with retry, naming and
/// priority admission.
///
/// Owns one scheduler thread and up to `max_workers` concurrent workers
/// (plus unbounded force-started ones). Shutdown is cooperative: stop
/// accepting, drain, then release the scheduler.
pub struct WorkQueue {
    collection: Arc<JobCollection>,
    events: Arc<QueueEvents>,
    default_attempts: u32,
    accepting: AtomicBool,
    scheduler: Mutex<Option<thread::JoinHandle<()>>>,
}

impl WorkQueue {
    /// Create a queue with thread-based workers.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        Self::with_spawner(config, Arc::new(ThreadSpawner))
    }

    /// Create a queue with a custom worker factory.
    pub fn with_spawner(
        config: QueueConfig,
        spawner: Arc<dyn Spawner>,
    ) -> Result<Self, QueueError> {
        if config.max_workers == 0 {
            return Err(QueueError::InvalidWorkerCount);
        }
        if config.default_attempts == 0 {
            return Err(QueueError::InvalidAttempts);
        }

        let collection = Arc::new(JobCollection::new(config.max_workers));
        let events = Arc::new(QueueEvents::new());
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&collection),
            spawner,
            Arc::clone(&events),
            config.debug,
        ));

        let handle = thread::Builder::new()
            .name("convoy-scheduler".to_string())
            .spawn(move || scheduler.run())
            .map_err(|e| QueueError::Scheduler(e.to_string()))?;

        Ok(Self {
            collection,
            events,
            default_attempts: config.default_attempts,
            accepting: AtomicBool::new(true),
            scheduler: Mutex::new(Some(handle)),
        })
    }

    fn admit(&self, spec: &JobSpec) -> Result<(), QueueError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(QueueError::ShutDown);
        }
        if spec.times == Some(0) {
            return Err(QueueError::InvalidAttempts);
        }
        Ok(())
    }

    /// Enqueue at the tail.
    pub fn enqueue(&self, spec: JobSpec) -> Result<Job, QueueError> {
        self.admit(&spec)?;
        let job = Job::new(spec, self.default_attempts);
        self.collection.append(job.clone());
        Ok(job)
    }

    /// Enqueue unless a job with the same name is already pending or
    /// running; returns `None` when ignored.
    pub fn enqueue_or_ignore(&self, spec: JobSpec) -> Result<Option<Job>, QueueError> {
        self.admit(&spec)?;
        let Some(name) = spec.name.clone() else {
            return Err(QueueError::NameRequired);
        };
        let job = Job::new(spec, self.default_attempts);
        let inserted = self.collection.with_lock(|c| {
            if c.get_from_name(&name).is_some() {
                None
            } else {
                c.append(job.clone());
                Some(job)
            }
        });
        Ok(inserted)
    }

    /// Enqueue at the head. With `force_start`, the job bypasses the
    /// concurrency cap and begins execution immediately.
    pub fn priority_enqueue(&self, spec: JobSpec, force_start: bool) -> Result<Job, QueueError> {
        self.admit(&spec)?;
        let job = Job::new(spec, self.default_attempts);
        self.collection.appendleft(job.clone(), force_start);
        Ok(job)
    }

    /// Raise the priority of the named job if it exists (returning `None`),
    /// otherwise enqueue the spec at the tail.
    pub fn priority_enqueue_or_raise(
        &self,
        spec: JobSpec,
        force_start: bool,
    ) -> Result<Option<Job>, QueueError> {
        self.admit(&spec)?;
        let Some(name) = spec.name.clone() else {
            return Err(QueueError::NameRequired);
        };
        let job = Job::new(spec, self.default_attempts);
        let inserted = self.collection.with_lock(|c| {
            match c.get_from_name(&name) {
                Some(existing) => {
                    c.prioritize(&existing, force_start);
                    None
                }
                None => {
                    c.append(job.clone());
                    Some(job)
                }
            }
        });
        Ok(inserted)
    }

    /// Suspend dispatch; enqueueing stays allowed.
    pub fn pause(&self) {
        self.collection.pause();
    }

    /// Resume dispatch.
    pub fn unpause(&self) {
        self.collection.unpause();
    }

    /// Block until the given job id has left the queue.
    pub fn wait_for(&self, id: JobId) {
        self.collection.wait_for_id(id);
    }

    /// Block until no job is pending or running.
    pub fn wait_until_done(&self) {
        self.collection.wait_until_empty();
    }

    /// Request cancellation of a job.
    ///
    /// A pending job is removed outright (its abort and done events fire);
    /// a running job only has its cancel token tripped and keeps running
    /// until the callable observes it.
    pub fn cancel(&self, id: JobId) -> CancelOutcome {
        if let Some(job) = self.collection.cancel_pending(id) {
            self.events.job_aborted.emit(&job);
            job.fire_done(JobOutcome::Aborted);
            if self.collection.is_empty() {
                self.events.queue_empty.emit(&());
            }
            return CancelOutcome::Removed;
        }
        match self.collection.get(id) {
            Some(job) => {
                job.cancel_token().cancel();
                CancelOutcome::Signalled
            }
            None => CancelOutcome::NotFound,
        }
    }

    /// Pending plus running jobs.
    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Stop accepting jobs, drain pending and running work, then release
    /// the scheduler thread.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.collection.wait_until_empty();
        self.collection.stop();
        if let Some(handle) = self.scheduler.lock().take() {
            let _ = handle.join();
        }
    }

    // Event registration surfaces.

    pub fn job_init_event(&self) -> &Signal<Job> {
        &self.events.job_init
    }

    pub fn job_started_event(&self) -> &Signal<Job> {
        &self.events.job_started
    }

    pub fn job_error_event(&self) -> &Signal<(Job, WorkError)> {
        &self.events.job_error
    }

    pub fn job_succeeded_event(&self) -> &Signal<Job> {
        &self.events.job_succeeded
    }

    pub fn job_aborted_event(&self) -> &Signal<Job> {
        &self.events.job_aborted
    }

    pub fn queue_empty_event(&self) -> &Signal<()> {
        &self.events.queue_empty
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.collection.stop();
        if let Some(handle) = self.scheduler.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
