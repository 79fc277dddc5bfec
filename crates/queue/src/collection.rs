// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread-safe collection of pending and running jobs.
//!
//! One logical queue with three regions: a FIFO of pending jobs, a set of
//! running jobs bounded by `max_workers`, and a force-start set admitted
//! past the concurrency cap. A by-name index supports deduplication and
//! prioritization of named jobs.

use crate::job::{Job, JobId};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};

struct Inner {
    max_workers: usize,
    next_id: u64,
    pending: VecDeque<Job>,
    /// Jobs admitted past the concurrency cap, dispatched before `pending`.
    force_pending: VecDeque<Job>,
    running: HashMap<JobId, Job>,
    force_started: HashSet<JobId>,
    names: HashMap<String, JobId>,
    paused: bool,
    stopped: bool,
}

impl Inner {
    fn assign(&mut self, job: &Job) -> JobId {
        self.next_id += 1;
        let id = JobId(self.next_id);
        job.assign_id(id);
        if let Some(name) = job.name() {
            self.names.insert(name.to_string(), id);
        }
        id
    }

    /// Running workers that count against the concurrency cap.
    fn counted_running(&self) -> usize {
        self.running.len().saturating_sub(self.force_started.len())
    }

    fn len(&self) -> usize {
        self.pending.len() + self.force_pending.len() + self.running.len()
    }

    fn find(&self, id: JobId) -> Option<&Job> {
        self.running
            .get(&id)
            .or_else(|| self.pending.iter().find(|j| j.id() == id))
            .or_else(|| self.force_pending.iter().find(|j| j.id() == id))
    }

    fn get_from_name(&self, name: &str) -> Option<&Job> {
        let id = *self.names.get(name)?;
        self.find(id)
    }

    fn unregister_name(&mut self, job: &Job) {
        if let Some(name) = job.name() {
            if self.names.get(name) == Some(&job.id()) {
                self.names.remove(name);
            }
        }
    }

    /// Move a pending job to the dispatch head. Returns false when the job
    /// is not pending (already running or gone).
    fn prioritize(&mut self, id: JobId, force: bool) -> bool {
        let from_pending = self.pending.iter().position(|j| j.id() == id);
        let job = match from_pending {
            Some(pos) => match self.pending.remove(pos) {
                Some(job) => job,
                None => return false,
            },
            None => return false,
        };
        if force {
            self.force_pending.push_back(job);
        } else {
            self.pending.push_front(job);
        }
        true
    }
}

/// Blocking queue of pending and running jobs.
pub struct JobCollection {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl JobCollection {
    pub fn new(max_workers: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                max_workers,
                next_id: 0,
                pending: VecDeque::new(),
                force_pending: VecDeque::new(),
                running: HashMap::new(),
                force_started: HashSet::new(),
                names: HashMap::new(),
                paused: false,
                stopped: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Append at the tail; returns the assigned id.
    pub fn append(&self, job: Job) -> JobId {
        let mut inner = self.inner.lock();
        let id = inner.assign(&job);
        inner.pending.push_back(job);
        self.cond.notify_all();
        id
    }

    /// Insert at the head. With `force`, the job bypasses the concurrency
    /// cap entirely and begins execution on the next dispatch.
    pub fn appendleft(&self, job: Job, force: bool) -> JobId {
        let mut inner = self.inner.lock();
        let id = inner.assign(&job);
        if force {
            inner.force_pending.push_back(job);
        } else {
            inner.pending.push_front(job);
        }
        self.cond.notify_all();
        id
    }

    /// Look a job up by name over pending and running.
    pub fn get_from_name(&self, name: &str) -> Option<Job> {
        self.inner.lock().get_from_name(name).cloned()
    }

    /// Look a job up by id over pending and running.
    pub fn get(&self, id: JobId) -> Option<Job> {
        self.inner.lock().find(id).cloned()
    }

    /// Move an existing pending job to the dispatch head.
    pub fn prioritize(&self, job: &Job, force: bool) -> bool {
        let mut inner = self.inner.lock();
        let moved = inner.prioritize(job.id(), force);
        if moved {
            self.cond.notify_all();
        }
        moved
    }

    /// Run `f` while holding the collection lock, for composing atomic
    /// read-then-write sequences such as enqueue-or-ignore.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut LockedCollection<'_>) -> R) -> R {
        let mut guard = self.inner.lock();
        let mut view = LockedCollection {
            inner: &mut *guard,
            cond: &self.cond,
        };
        f(&mut view)
    }

    /// Block until a job is dispatchable, then mark it running and return
    /// it. Returns `None` after [`stop`](Self::stop) has been called.
    pub(crate) fn next(&self) -> Option<Job> {
        let mut inner = self.inner.lock();
        loop {
            if inner.stopped {
                return None;
            }
            if !inner.paused {
                if let Some(job) = inner.force_pending.pop_front() {
                    let id = job.id();
                    inner.force_started.insert(id);
                    inner.running.insert(id, job.clone());
                    return Some(job);
                }
                if inner.counted_running() < inner.max_workers {
                    if let Some(job) = inner.pending.pop_front() {
                        inner.running.insert(job.id(), job.clone());
                        return Some(job);
                    }
                }
            }
            self.cond.wait(&mut inner);
        }
    }

    /// Remove a finished job from the running set, release any waiters on
    /// its id, and report whether the queue just became idle.
    pub(crate) fn task_done(&self, job: &Job) -> bool {
        let mut inner = self.inner.lock();
        let id = job.id();
        inner.running.remove(&id);
        inner.force_started.remove(&id);
        inner.unregister_name(job);
        let idle = inner.len() == 0;
        self.cond.notify_all();
        idle
    }

    /// Remove a job that never started. Returns it when it was pending.
    pub(crate) fn cancel_pending(&self, id: JobId) -> Option<Job> {
        let mut inner = self.inner.lock();
        let job = if let Some(pos) = inner.pending.iter().position(|j| j.id() == id) {
            inner.pending.remove(pos)
        } else if let Some(pos) = inner.force_pending.iter().position(|j| j.id() == id) {
            inner.force_pending.remove(pos)
        } else {
            None
        }?;
        inner.unregister_name(&job);
        self.cond.notify_all();
        Some(job)
    }

    /// Block until `id` is absent: never enqueued, already done, or removed
    /// after execution. All waiters on the same id are released together.
    pub fn wait_for_id(&self, id: JobId) {
        let mut inner = self.inner.lock();
        while inner.find(id).is_some() && !inner.stopped {
            self.cond.wait(&mut inner);
        }
    }

    /// Block until the queue holds no pending or running jobs.
    pub fn wait_until_empty(&self) {
        let mut inner = self.inner.lock();
        while inner.len() > 0 && !inner.stopped {
            self.cond.wait(&mut inner);
        }
    }

    /// Suspend dispatch. Enqueueing stays allowed; iteration blocks.
    pub fn pause(&self) {
        self.inner.lock().paused = true;
    }

    /// Resume dispatch.
    pub fn unpause(&self) {
        let mut inner = self.inner.lock();
        inner.paused = false;
        self.cond.notify_all();
    }

    /// Make the dispatcher loop exit after the current dispatch.
    pub(crate) fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.stopped = true;
        self.cond.notify_all();
    }

    /// Pending plus running jobs.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn running_count(&self) -> usize {
        self.inner.lock().running.len()
    }

    pub fn pending_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.pending.len() + inner.force_pending.len()
    }
}

/// View of the collection with its lock held, handed to
/// [`JobCollection::with_lock`] closures.
pub struct LockedCollection<'a> {
    inner: &'a mut Inner,
    cond: &'a Condvar,
}

impl LockedCollection<'_> {
    pub fn append(&mut self, job: Job) -> JobId {
        let id = self.inner.assign(&job);
        self.inner.pending.push_back(job);
        self.cond.notify_all();
        id
    }

    pub fn appendleft(&mut self, job: Job, force: bool) -> JobId {
        let id = self.inner.assign(&job);
        if force {
            self.inner.force_pending.push_back(job);
        } else {
            self.inner.pending.push_front(job);
        }
        self.cond.notify_all();
        id
    }

    pub fn get_from_name(&self, name: &str) -> Option<Job> {
        self.inner.get_from_name(name).cloned()
    }

    pub fn prioritize(&mut self, job: &Job, force: bool) -> bool {
        let moved = self.inner.prioritize(job.id(), force);
        if moved {
            self.cond.notify_all();
        }
        moved
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
}

#[cfg(test)]
#[path = "collection_tests.rs"]
mod tests;
