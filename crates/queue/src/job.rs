// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A job: one schedulable invocation of a work payload.

use crate::cancel::CancelToken;
use crate::spawner::{ExitFn, Spawner, WorkerHandle};
use crate::work::{ExecSpec, JobContext, Work, WorkError, WorkFn};
use convoy_core::Signal;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier assigned by the collection's monotonic counter on insertion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct JobId(pub u64);

impl JobId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal outcome of a job, reported through its done event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    /// All attempts failed.
    Aborted,
}

/// Everything needed to enqueue a job.
pub struct JobSpec {
    pub name: Option<String>,
    /// Max attempts; `None` takes the queue default.
    pub times: Option<u32>,
    pub data: serde_json::Value,
    pub work: Work,
}

impl JobSpec {
    /// A job around an in-process callable.
    pub fn call(
        func: impl FnMut(&JobContext) -> Result<(), WorkError> + Send + 'static,
    ) -> Self {
        Self {
            name: None,
            times: None,
            data: serde_json::Value::Null,
            work: Work::Call(Box::new(func) as WorkFn),
        }
    }

    /// A job around an external command.
    pub fn exec(spec: ExecSpec) -> Self {
        Self {
            name: None,
            times: None,
            data: serde_json::Value::Null,
            work: Work::Exec(spec),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the retry budget (max attempts, at least 1).
    pub fn attempts(mut self, times: u32) -> Self {
        self.times = Some(times);
        self
    }

    /// Attach an opaque payload visible to the callable and to listeners.
    pub fn payload(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

struct JobInner {
    /// 0 until the collection assigns an id.
    id: AtomicU64,
    name: Option<String>,
    times: u32,
    failures: AtomicU32,
    data: serde_json::Value,
    work: Mutex<Work>,
    child: Mutex<Option<WorkerHandle>>,
    cancel: CancelToken,
    done: Signal<JobOutcome>,
}

/// A scheduled job. Cheap to clone; all clones share one record.
///
/// The value returned by the enqueue operations doubles as the queued-task
/// handle: `done_event()` fires exactly once after the job leaves the
/// queue, with the terminal outcome.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    pub(crate) fn new(spec: JobSpec, default_times: u32) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: AtomicU64::new(0),
                name: spec.name,
                times: spec.times.unwrap_or(default_times),
                failures: AtomicU32::new(0),
                data: spec.data,
                work: Mutex::new(spec.work),
                child: Mutex::new(None),
                cancel: CancelToken::new(),
                done: Signal::new(),
            }),
        }
    }

    /// Collection-assigned id. Zero only before insertion.
    pub fn id(&self) -> JobId {
        JobId(self.inner.id.load(Ordering::SeqCst))
    }

    pub(crate) fn assign_id(&self, id: JobId) {
        self.inner.id.store(id.0, Ordering::SeqCst);
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Retry budget: maximum number of attempts.
    pub fn times(&self) -> u32 {
        self.inner.times
    }

    /// Attempts that have raised so far.
    pub fn failures(&self) -> u32 {
        self.inner.failures.load(Ordering::SeqCst)
    }

    pub(crate) fn record_failure(&self) -> u32 {
        self.inner.failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.inner.data
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.inner.cancel.clone()
    }

    /// Fires exactly once with the terminal outcome, after the job has been
    /// removed from the queue.
    pub fn done_event(&self) -> &Signal<JobOutcome> {
        &self.inner.done
    }

    /// Name of the worker that would run the next attempt.
    pub(crate) fn worker_name(&self) -> String {
        let attempt = self.failures() + 1;
        match self.name() {
            Some(name) => format!("{name}#{attempt}"),
            None => format!("job-{}#{attempt}", self.id()),
        }
    }

    /// Whether a worker handle is attached and still alive.
    pub fn is_running(&self) -> bool {
        self.inner
            .child
            .lock()
            .as_ref()
            .is_some_and(|child| !child.is_finished())
    }

    /// Snapshot of the command spec, when this job wraps one.
    pub(crate) fn exec_spec(&self) -> Option<ExecSpec> {
        match &*self.inner.work.lock() {
            Work::Exec(spec) => Some(spec.clone()),
            Work::Call(_) => None,
        }
    }

    /// Launch the work in a fresh worker. `on_exit` is invoked exactly once
    /// when the worker finishes, including when the spawn itself fails.
    pub(crate) fn start(&self, spawner: &dyn Spawner, on_exit: ExitFn) {
        match spawner.spawn(self, on_exit) {
            Ok(handle) => {
                *self.inner.child.lock() = Some(handle);
            }
            Err(e) => {
                tracing::warn!(job = %self.id(), error = %e, "worker spawn failed");
                *self.inner.child.lock() = None;
            }
        }
    }

    /// Execute the work payload on the current thread.
    pub(crate) fn run_work(&self) -> Result<(), WorkError> {
        let ctx = JobContext {
            data: self.inner.data.clone(),
            cancel: self.inner.cancel.clone(),
        };
        let mut work = self.inner.work.lock();
        work.execute(&ctx)
    }

    /// Fire the done event once and drop its listeners.
    pub(crate) fn fire_done(&self, outcome: JobOutcome) {
        self.inner.done.emit(&outcome);
        self.inner.done.disconnect_all();
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("times", &self.times())
            .field("failures", &self.failures())
            .finish()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
