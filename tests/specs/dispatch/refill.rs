//! Queue refill: admission caps and atomic task claiming.

use crate::prelude::*;
use convoy_core::OrderStatus;
use convoy_storage::{MemoryDb, OrderDb, TaskFilter};
use std::sync::Arc;

#[test]
fn refill_admits_in_waves_bounded_by_the_queue_cap() {
    let dir = tempfile::tempdir().unwrap();
    let db: Arc<dyn OrderDb> = Arc::new(MemoryDb::new());
    let service = SpecService::new(10);
    let probe = Arc::clone(&service.probe);
    // Cap of 2: the refill loop can never have more than two tasks
    // admitted to the queue at once; completion triggers the next wave.
    let h = build_dispatcher(Arc::clone(&db), dir.path(), 1, 2, service);

    let order = h.daemon.submit("fleet", serde_json::Value::Null);
    wait_for_order_status(&*db, &order.id(), OrderStatus::Completed);

    assert_eq!(probe.runs(), 10);
    assert_eq!(db.count_tasks(&order.id(), TaskFilter::Closed).unwrap(), 10);
    h.dispatcher.shutdown();
}

#[test]
fn two_dispatchers_sharing_a_database_partition_the_tasks() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let db: Arc<dyn OrderDb> = Arc::new(MemoryDb::new());

    let probe = Arc::new(Probe::default());
    let service_a = SpecService {
        tasks: 30,
        gated_last: false,
        close_order_after: None,
        probe: Arc::clone(&probe),
    };
    let service_b = SpecService {
        tasks: 0,
        gated_last: false,
        close_order_after: None,
        probe: Arc::clone(&probe),
    };

    // Dispatcher A admits the order and creates the tasks; both refill
    // from the same database into their own queues.
    let a = build_dispatcher(Arc::clone(&db), dir_a.path(), 2, 5, service_a);
    let b = build_dispatcher(Arc::clone(&db), dir_b.path(), 2, 5, service_b);

    let order = a.daemon.submit("fleet", serde_json::Value::Null);
    // Drive B's refill loop alongside A's until everything drains.
    wait_until("all thirty tasks to run", || {
        let _ = b.dispatcher.fill_queue(SPEC_QUEUE);
        probe.runs() == 30
    });

    // Every task ran exactly once: the by-id set matches the run count.
    assert_eq!(probe.task_ids.lock().len(), 30);
    wait_for_order_status(&*db, &order.id(), OrderStatus::Completed);

    a.dispatcher.shutdown();
    b.dispatcher.shutdown();
}
