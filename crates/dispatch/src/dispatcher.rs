// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Order dispatcher: admission, task persistence, queue refill and
//! order-completion tracking.

use crate::daemon::Daemon;
use crate::error::DispatchError;
use crate::order::Order;
use crate::order_logger::OrderLogger;
use crate::service::{Service, ServiceContext};
use crate::task::Task;
use convoy_core::{
    Clock, CoreConfig, IdGen, OrderId, OrderStatus, SystemClock, TaskId, TaskRecord, TaskStatus,
    UuidIdGen,
};
use convoy_queue::{JobSpec, WorkError, WorkQueue};
use convoy_storage::{OrderDb, TaskFilter};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

/// Tunables for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Base directory for per-order log files.
    pub logdir: PathBuf,
    /// Admission cap per queue for the refill loop.
    pub queue_capacity: usize,
}

impl From<&CoreConfig> for DispatcherConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            logdir: config.log_dir.clone(),
            queue_capacity: config.queue_capacity,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&CoreConfig::default())
    }
}

/// Durable admission layer above the work queues.
///
/// Daemon threads call [`place_order`](Self::place_order); short-lived
/// helper threads run the enter path; worker threads re-enter through
/// task completion. Refill and completion are serialized on one internal
/// lock so they never race.
pub struct OrderDispatcher {
    db: Arc<dyn OrderDb>,
    clock: Arc<dyn Clock>,
    queues: HashMap<String, Arc<WorkQueue>>,
    logdir: PathBuf,
    queue_capacity: usize,
    services: Mutex<HashMap<String, Arc<dyn Service>>>,
    daemons: Mutex<HashMap<String, Arc<dyn Daemon>>>,
    /// Per-order file loggers, torn down when the order closes.
    loggers: Mutex<HashMap<String, HashMap<String, Arc<OrderLogger>>>>,
    ids: UuidIdGen,
    /// Serializes refill and task-completion handling.
    refill: Mutex<()>,
}

impl OrderDispatcher {
    /// Build a dispatcher over `db` and the named work queues.
    ///
    /// Startup closes orders stranded by a previous run and resets their
    /// in-flight tasks (crash recovery).
    pub fn new(
        db: Arc<dyn OrderDb>,
        queues: HashMap<String, Arc<WorkQueue>>,
        config: DispatcherConfig,
    ) -> Result<Arc<Self>, DispatchError> {
        Self::with_clock(db, queues, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        db: Arc<dyn OrderDb>,
        queues: HashMap<String, Arc<WorkQueue>>,
        config: DispatcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>, DispatchError> {
        tracing::info!("closing all open orders");
        let closed = db.close_open_orders(clock.epoch_ms())?;
        if closed > 0 {
            tracing::info!(count = closed, "closed stranded orders");
        }

        Ok(Arc::new(Self {
            db,
            clock,
            queues,
            logdir: config.logdir,
            queue_capacity: config.queue_capacity,
            services: Mutex::new(HashMap::new()),
            daemons: Mutex::new(HashMap::new()),
            loggers: Mutex::new(HashMap::new()),
            ids: UuidIdGen,
            refill: Mutex::new(()),
        }))
    }

    /// Register a service under its name.
    pub fn service_added(&self, service: Arc<dyn Service>) {
        let name = service.name().to_string();
        self.services.lock().insert(name, service);
    }

    /// Register a daemon and bind the admission path to its incoming event.
    pub fn daemon_added(self: &Arc<Self>, daemon: Arc<dyn Daemon>) {
        let daemon_name = daemon.name().to_string();
        self.daemons
            .lock()
            .insert(daemon_name.clone(), Arc::clone(&daemon));

        let me = Arc::downgrade(self);
        daemon
            .order_incoming_event()
            .listen(move |order: &Arc<Order>| {
                let Some(dispatcher) = me.upgrade() else {
                    return;
                };
                if let Err(e) = dispatcher.place_order(Arc::clone(order), &daemon_name) {
                    tracing::error!(
                        daemon = %daemon_name,
                        order = %order.id(),
                        error = %e,
                        "order admission failed"
                    );
                }
            });
    }

    pub fn db(&self) -> &Arc<dyn OrderDb> {
        &self.db
    }

    pub fn queue(&self, name: &str) -> Option<&Arc<WorkQueue>> {
        self.queues.get(name)
    }

    pub fn daemon(&self, name: &str) -> Option<Arc<dyn Daemon>> {
        self.daemons.lock().get(name).cloned()
    }

    /// Gracefully drain and release every work queue.
    pub fn shutdown(&self) {
        for queue in self.queues.values() {
            queue.shutdown();
        }
    }

    /// File logger inside the order's log directory, cached per order.
    pub fn get_logger(&self, order: &Arc<Order>, name: &str) -> Arc<OrderLogger> {
        let order_id = order.id();
        let mut loggers = self.loggers.lock();
        let per_order = loggers.entry(order_id.as_str().to_string()).or_default();
        if let Some(logger) = per_order.get(name) {
            return Arc::clone(logger);
        }
        let path = self
            .logdir
            .join(order.service())
            .join(order_id.as_str())
            .join(name);
        let logger = Arc::new(OrderLogger::new(path, Arc::clone(&self.clock)));
        per_order.insert(name.to_string(), Arc::clone(&logger));
        logger
    }

    fn free_loggers(&self, order_id: &OrderId) {
        self.loggers.lock().remove(order_id.as_str());
    }

    pub(crate) fn log(&self, order: &Arc<Order>, message: &str) {
        tracing::info!(service = %order.service(), order = %order.id(), "{message}");
    }

    /// Persist a status change and log it.
    pub fn set_order_status(
        &self,
        order: &Arc<Order>,
        status: OrderStatus,
    ) -> Result<(), DispatchError> {
        order.set_status(status);
        self.db.save_order(&order.record())?;
        self.log(order, &format!("status is now \"{status}\""));
        Ok(())
    }

    /// Admission path, invoked on the daemon's thread.
    ///
    /// A failing `check` is persisted as terminal `error` before the
    /// failure is surfaced to the caller.
    pub fn place_order(
        self: &Arc<Self>,
        order: Arc<Order>,
        daemon_name: &str,
    ) -> Result<(), DispatchError> {
        tracing::debug!(daemon = daemon_name, order = %order.id(), "incoming order");
        self.set_order_status(&order, OrderStatus::Incoming)?;

        let service = self.services.lock().get(&order.service()).cloned();
        let Some(service) = service else {
            order.close(self.clock.epoch_ms());
            self.set_order_status(&order, OrderStatus::ServiceNotFound)?;
            return Ok(());
        };

        let ctx = ServiceContext::new(self);
        let accepted = match service.check(&ctx, &order) {
            Ok(accepted) => accepted,
            Err(e) => {
                self.log(&order, &format!("check raised: {e}"));
                order.close(self.clock.epoch_ms());
                self.set_order_status(&order, OrderStatus::Error)?;
                return Err(DispatchError::Check {
                    order: order.id(),
                    source: e,
                });
            }
        };

        if !accepted {
            order.close(self.clock.epoch_ms());
            self.set_order_status(&order, OrderStatus::Rejected)?;
            return Ok(());
        }
        self.set_order_status(&order, OrderStatus::Accepted)?;

        // Enter on a helper thread so the daemon thread returns immediately.
        let me = Arc::clone(self);
        thread::Builder::new()
            .name("convoy-enter".to_string())
            .spawn(move || {
                if let Err(e) = me.enter_order(&service, &order) {
                    tracing::error!(order = %order.id(), error = %e, "enter failed");
                }
            })
            .map_err(|e| DispatchError::Thread(e.to_string()))?;
        Ok(())
    }

    fn enter_order(
        self: &Arc<Self>,
        service: &Arc<dyn Service>,
        order: &Arc<Order>,
    ) -> Result<(), DispatchError> {
        self.set_order_status(order, OrderStatus::Saving)?;
        self.db.save_order(&order.record())?;

        self.set_order_status(order, OrderStatus::EnterStart)?;
        let ctx = ServiceContext::new(self);
        let entered = match service.enter(&ctx, order) {
            Ok(entered) => entered,
            Err(e) => {
                self.log(order, &format!("enter raised: {e}"));
                order.close(self.clock.epoch_ms());
                self.set_order_status(order, OrderStatus::EnterException)?;
                return Err(DispatchError::Enter {
                    order: order.id(),
                    source: e,
                });
            }
        };

        if !entered {
            self.log(order, "enter returned false");
            order.close(self.clock.epoch_ms());
            self.set_order_status(order, OrderStatus::EnterError)?;
            return Ok(());
        }
        self.set_order_status(order, OrderStatus::Entered)?;

        // If the service enqueued nothing, the order may already be done.
        {
            let _guard = self.refill.lock();
            self.update_order_status(order)?;
        }
        Ok(())
    }

    /// Create a task wired for persistence and dispatch (service API).
    pub(crate) fn create_task(
        self: &Arc<Self>,
        order: &Arc<Order>,
        name: impl Into<String>,
        queue_name: &str,
        func_name: impl Into<String>,
    ) -> Result<Arc<Task>, DispatchError> {
        if !self.queues.contains_key(queue_name) {
            return Err(DispatchError::UnknownQueue(queue_name.to_string()));
        }

        let record = TaskRecord::new(
            TaskId::new(self.ids.next()),
            order.id(),
            name,
            queue_name,
            func_name,
            self.clock.epoch_ms(),
        );
        let task = Task::new(record, Arc::clone(&self.clock));

        let me = Arc::downgrade(self);
        task.go_event().listen(move |t: &Arc<Task>| {
            if let Some(dispatcher) = me.upgrade() {
                dispatcher.on_task_go(t);
            }
        });
        let me = Arc::downgrade(self);
        task.changed_event().listen(move |t: &Arc<Task>| {
            if let Some(dispatcher) = me.upgrade() {
                dispatcher.on_task_changed(t);
            }
        });

        self.db.save_task(&task.record())?;
        Ok(task)
    }

    fn on_task_changed(&self, task: &Arc<Task>) {
        if let Err(e) = self.db.save_task(&task.record()) {
            tracing::error!(task = %task.id(), error = %e, "failed to persist task");
        }
    }

    /// A service marked a task ready: detach the creation-time listeners
    /// (refill re-attaches its own) and admit work from the database.
    fn on_task_go(self: &Arc<Self>, task: &Arc<Task>) {
        task.go_event().disconnect_all();
        task.closed_event().disconnect_all();
        task.changed_event().disconnect_all();

        let _guard = self.refill.lock();
        if let Err(e) = self.fill_queue_locked(&task.queue_name()) {
            tracing::error!(queue = %task.queue_name(), error = %e, "queue refill failed");
        }
    }

    /// Admit eligible tasks from the database onto the named queue, up to
    /// the per-queue cap.
    pub fn fill_queue(self: &Arc<Self>, queue_name: &str) -> Result<(), DispatchError> {
        let _guard = self.refill.lock();
        self.fill_queue_locked(queue_name)
    }

    fn fill_queue_locked(self: &Arc<Self>, queue_name: &str) -> Result<(), DispatchError> {
        let queue = self
            .queues
            .get(queue_name)
            .ok_or_else(|| DispatchError::UnknownQueue(queue_name.to_string()))?;

        let free = self.queue_capacity.saturating_sub(queue.len());
        if free == 0 {
            return Ok(());
        }

        // Atomic grab: no other refiller can claim the same rows.
        let records = self
            .db
            .mark_tasks(TaskStatus::Loading, free, queue_name, TaskStatus::Go)?;
        if records.is_empty() {
            return Ok(());
        }
        tracing::info!(queue = queue_name, count = records.len(), "restoring persistent tasks");

        // Pause so no done event can fire before its listener is wired.
        queue.pause();
        for record in records {
            if let Err(e) = self.enqueue_task(queue, record) {
                tracing::error!(queue = queue_name, error = %e, "failed to enqueue task");
            }
        }
        queue.unpause();
        tracing::info!(queue = queue_name, "queue filled");
        Ok(())
    }

    fn enqueue_task(
        self: &Arc<Self>,
        queue: &Arc<WorkQueue>,
        record: TaskRecord,
    ) -> Result<(), DispatchError> {
        let task = Task::new(record, Arc::clone(&self.clock));

        let me = Arc::downgrade(self);
        task.changed_event().listen(move |t: &Arc<Task>| {
            if let Some(dispatcher) = me.upgrade() {
                dispatcher.on_task_changed(t);
            }
        });
        task.closed_event().listen(|t: &Arc<Task>| {
            t.go_event().disconnect_all();
            t.changed_event().disconnect_all();
            t.closed_event().disconnect_all();
        });

        let Some(order_record) = self.db.get_order(&task.order_id())? else {
            tracing::warn!(task = %task.id(), order = %task.order_id(), "task references a missing order");
            task.close(TaskStatus::InternalError);
            return Ok(());
        };
        let order = Order::from_record(order_record);

        let run_me = Arc::downgrade(self);
        let run_order = Arc::clone(&order);
        let run_task = Arc::clone(&task);
        let spec = JobSpec::call(move |_scope| {
            let Some(dispatcher) = run_me.upgrade() else {
                return Err(WorkError::Failed("dispatcher dropped".to_string()));
            };
            dispatcher
                .run_task(&run_order, &run_task)
                .map_err(|e| WorkError::Failed(e.to_string()))
        })
        .named(task.name())
        .payload(serde_json::json!({
            "task_id": task.id().as_str(),
            "order_id": order.id().as_str(),
        }));

        let job = queue.enqueue(spec)?;
        let done_me = Arc::downgrade(self);
        let done_task = Arc::clone(&task);
        let done_order = Arc::clone(&order);
        job.done_event().listen(move |_outcome| {
            if let Some(dispatcher) = done_me.upgrade() {
                dispatcher.on_qtask_done(&done_task, &done_order);
            }
        });

        task.set_status(TaskStatus::Queued);
        Ok(())
    }

    /// Task execution body, invoked inside a worker.
    fn run_task(
        self: &Arc<Self>,
        order: &Arc<Order>,
        task: &Arc<Task>,
    ) -> Result<(), DispatchError> {
        let service = self
            .services
            .lock()
            .get(&order.service())
            .cloned()
            .ok_or_else(|| DispatchError::ServiceNotFound(order.service()))?;

        task.set_status(TaskStatus::InProgress);
        let ctx = ServiceContext::new(self);
        match service.run_function(&task.func_name(), &ctx, order, task) {
            Err(e) => {
                task.close(TaskStatus::InternalError);
                Err(DispatchError::Function {
                    task: task.id(),
                    func: task.func_name(),
                    source: e,
                })
            }
            Ok(()) => {
                if !task.is_closed() {
                    task.completed();
                }
                Ok(())
            }
        }
    }

    /// A queued job finished: admit the next wave, then check whether its
    /// order is complete.
    fn on_qtask_done(self: &Arc<Self>, task: &Arc<Task>, order: &Arc<Order>) {
        let _guard = self.refill.lock();
        if let Err(e) = self.fill_queue_locked(&task.queue_name()) {
            tracing::error!(queue = %task.queue_name(), error = %e, "queue refill failed");
        }
        if let Err(e) = self.update_order_status(order) {
            tracing::error!(order = %order.id(), error = %e, "order status update failed");
        }
    }

    /// Close the order once no open tasks remain.
    ///
    /// Callers hold the refill lock. Completion is decided against the
    /// stored record: a task finishing before the enter thread persists
    /// `entered` must not complete (or strand) the order.
    fn update_order_status(&self, order: &Arc<Order>) -> Result<(), DispatchError> {
        let Some(stored) = self.db.get_order(&order.id())? else {
            return Ok(());
        };
        if stored.status != OrderStatus::Entered || stored.is_closed() {
            return Ok(());
        }
        let remaining = self.db.count_tasks(&order.id(), TaskFilter::Open)?;
        if remaining == 0 {
            order.close(self.clock.epoch_ms());
            self.free_loggers(&order.id());
            self.set_order_status(order, OrderStatus::Completed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
