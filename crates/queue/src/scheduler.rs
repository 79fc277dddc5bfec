// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler loop: dispatches ready jobs and drives retry on failure.

use crate::collection::JobCollection;
use crate::events::QueueEvents;
use crate::job::{Job, JobOutcome};
use crate::spawner::Spawner;
use crate::work::WorkError;
use std::sync::Arc;

pub(crate) struct Scheduler {
    collection: Arc<JobCollection>,
    spawner: Arc<dyn Spawner>,
    events: Arc<QueueEvents>,
    debug: u8,
}

impl Scheduler {
    pub(crate) fn new(
        collection: Arc<JobCollection>,
        spawner: Arc<dyn Spawner>,
        events: Arc<QueueEvents>,
        debug: u8,
    ) -> Self {
        Self {
            collection,
            spawner,
            events,
            debug,
        }
    }

    fn dbg(&self, level: u8, job: &Job, msg: &str) {
        if self.debug >= level {
            tracing::debug!(job = %job.id(), name = job.name().unwrap_or(""), "{msg}");
        }
    }

    /// Run until the collection is stopped. One dedicated thread.
    pub(crate) fn run(self: &Arc<Self>) {
        while let Some(job) = self.collection.next() {
            self.events.job_init.emit(&job);
            self.start_job(&job);
            self.dbg(1, &job, "job started");
        }
        if self.debug >= 2 {
            tracing::debug!("scheduler loop terminated");
        }
    }

    fn start_job(self: &Arc<Self>, job: &Job) {
        let scheduler = Arc::clone(self);
        let completed = job.clone();
        job.start(
            &*self.spawner,
            Box::new(move |err| scheduler.on_job_completed(completed, err)),
        );
        self.events.job_started.emit(job);
    }

    /// Completion callback; runs on the worker's thread, never the
    /// scheduler's. Events for the attempt fire before the job is removed
    /// from the collection.
    fn on_job_completed(self: &Arc<Self>, job: Job, err: Option<WorkError>) {
        match err {
            Some(cause) => {
                let failures = job.record_failure();
                self.dbg(1, &job, "job attempt failed");
                self.events.job_error.emit(&(job.clone(), cause));
                if failures < job.times() {
                    self.dbg(1, &job, "restarting job");
                    self.start_job(&job);
                } else {
                    self.dbg(1, &job, "job finally failed");
                    self.events.job_aborted.emit(&job);
                    self.finish(job, JobOutcome::Aborted);
                }
            }
            None => {
                self.dbg(1, &job, "job succeeded");
                self.events.job_succeeded.emit(&job);
                self.finish(job, JobOutcome::Succeeded);
            }
        }
    }

    fn finish(&self, job: Job, outcome: JobOutcome) {
        let idle = self.collection.task_done(&job);
        job.fire_done(outcome);
        if idle {
            self.events.queue_empty.emit(&());
        }
    }
}
