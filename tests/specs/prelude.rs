//! Shared helpers for the behavioral specs.

#![allow(dead_code)]

use convoy_core::{FakeClock, OrderId, OrderStatus};
use convoy_dispatch::{
    Daemon, DispatcherConfig, LocalDaemon, Order, OrderDispatcher, Service, ServiceContext,
    ServiceError, Task,
};
use convoy_queue::{QueueConfig, WorkQueue};
use convoy_storage::OrderDb;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SPEC_QUEUE: &str = "net";

pub fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

pub fn order_status(db: &dyn OrderDb, id: &OrderId) -> Option<OrderStatus> {
    db.get_order(id).ok().flatten().map(|o| o.status)
}

pub fn wait_for_order_status(db: &dyn OrderDb, id: &OrderId, status: OrderStatus) {
    wait_until(&format!("order status {status}"), || {
        order_status(db, id) == Some(status)
    });
}

/// Observations shared between a spec and its service.
#[derive(Default)]
pub struct Probe {
    pub runs: AtomicUsize,
    pub task_ids: Mutex<HashSet<String>>,
    pub gate_open: AtomicBool,
}

impl Probe {
    pub fn open_gate(&self) {
        self.gate_open.store(true, Ordering::SeqCst);
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

/// Configurable fleet service for the dispatch specs.
///
/// `enter` creates `tasks` tasks on [`SPEC_QUEUE`]; every task runs
/// "touch" except, with `gated_last`, the final one runs "gated" which
/// spins until the probe's gate opens.
pub struct SpecService {
    pub tasks: usize,
    pub gated_last: bool,
    /// Close the order from service code once this many tasks have run.
    pub close_order_after: Option<usize>,
    pub probe: Arc<Probe>,
}

impl SpecService {
    pub fn new(tasks: usize) -> Self {
        Self {
            tasks,
            gated_last: false,
            close_order_after: None,
            probe: Arc::new(Probe::default()),
        }
    }
}

impl Service for SpecService {
    fn name(&self) -> &str {
        "fleet"
    }

    fn check(&self, _ctx: &ServiceContext<'_>, _order: &Arc<Order>) -> Result<bool, ServiceError> {
        Ok(true)
    }

    fn enter(&self, ctx: &ServiceContext<'_>, order: &Arc<Order>) -> Result<bool, ServiceError> {
        let mut created = Vec::new();
        for i in 0..self.tasks {
            let func = if self.gated_last && i == self.tasks - 1 {
                "gated"
            } else {
                "touch"
            };
            let task = ctx
                .create_task(order, format!("{func}-{i}"), SPEC_QUEUE, func)
                .map_err(|e| ServiceError::failed(e.to_string()))?;
            created.push(task);
        }
        // All tasks exist before any is marked ready.
        for task in created {
            task.go();
        }
        Ok(true)
    }

    fn run_function(
        &self,
        func_name: &str,
        _ctx: &ServiceContext<'_>,
        order: &Arc<Order>,
        task: &Arc<Task>,
    ) -> Result<(), ServiceError> {
        if func_name == "gated" {
            while !self.probe.gate_open.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(2));
            }
        }
        self.probe
            .task_ids
            .lock()
            .insert(task.id().as_str().to_string());
        let runs = self.probe.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if self.close_order_after == Some(runs) {
            order.close(1);
        }
        Ok(())
    }
}

pub struct DispatchHarness {
    pub dispatcher: Arc<OrderDispatcher>,
    pub daemon: Arc<LocalDaemon>,
}

/// Assemble a dispatcher over `db` with one spec queue.
pub fn build_dispatcher(
    db: Arc<dyn OrderDb>,
    logdir: &Path,
    max_workers: usize,
    queue_capacity: usize,
    service: SpecService,
) -> DispatchHarness {
    let queue = Arc::new(WorkQueue::new(QueueConfig::new(max_workers)).unwrap());
    let mut queues = HashMap::new();
    queues.insert(SPEC_QUEUE.to_string(), queue);

    let config = DispatcherConfig {
        logdir: logdir.to_path_buf(),
        queue_capacity,
    };
    let dispatcher =
        OrderDispatcher::with_clock(db, queues, config, Arc::new(FakeClock::new())).unwrap();
    dispatcher.service_added(Arc::new(service));

    let daemon = Arc::new(LocalDaemon::new("local"));
    dispatcher.daemon_added(Arc::clone(&daemon) as Arc<dyn Daemon>);

    DispatchHarness { dispatcher, daemon }
}
