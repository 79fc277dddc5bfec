//! Restart recovery: refilling queues from persisted task state.

use crate::prelude::*;
use convoy_core::{OrderId, OrderRecord, OrderStatus, TaskId, TaskRecord, TaskStatus};
use convoy_storage::{OrderDb, TaskFilter, WalDb};
use std::sync::Arc;

/// Persist the state a crashed scheduler run would leave behind: one
/// entered order and `tasks` tasks ready in `go` on the spec queue.
fn seed_previous_run(db: &dyn OrderDb, tasks: usize) -> OrderId {
    let order_id = OrderId::new("o-recovered");
    let mut order = OrderRecord::new(
        order_id.clone(),
        "fleet",
        serde_json::json!({"batch": "nightly"}),
        1_000,
    );
    order.status = OrderStatus::Entered;
    db.save_order(&order).unwrap();

    for i in 0..tasks {
        let mut task = TaskRecord::new(
            TaskId::new(format!("t-{i:03}")),
            order_id.clone(),
            format!("touch-{i}"),
            SPEC_QUEUE,
            "touch",
            1_000 + i as u64,
        );
        task.status = TaskStatus::Go;
        db.save_task(&task).unwrap();
    }
    order_id
}

#[test]
fn fifty_go_tasks_reload_and_complete_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("db");

    {
        let db = WalDb::open(&db_dir).unwrap();
        seed_previous_run(&db, 50);
    }

    // "Restart": a fresh database handle over the same directory, a fresh
    // dispatcher, and one explicit refill of the queue.
    let db: Arc<dyn OrderDb> = Arc::new(WalDb::open(&db_dir).unwrap());
    let service = SpecService::new(0);
    let probe = Arc::clone(&service.probe);
    let h = build_dispatcher(Arc::clone(&db), &dir.path().join("logs"), 4, 100, service);

    let order_id = OrderId::new("o-recovered");
    assert_eq!(db.count_tasks(&order_id, TaskFilter::Open).unwrap(), 50);

    h.dispatcher.fill_queue(SPEC_QUEUE).unwrap();
    wait_for_order_status(&*db, &order_id, OrderStatus::Completed);

    assert_eq!(probe.runs(), 50);
    assert_eq!(db.count_tasks(&order_id, TaskFilter::Open).unwrap(), 0);
    assert_eq!(db.count_tasks(&order_id, TaskFilter::Closed).unwrap(), 50);
    h.dispatcher.shutdown();
}

#[test]
fn startup_closes_orders_stranded_mid_admission() {
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("db");

    {
        let db = WalDb::open(&db_dir).unwrap();
        let mut stuck = OrderRecord::new(
            OrderId::new("o-stuck"),
            "fleet",
            serde_json::Value::Null,
            1_000,
        );
        stuck.status = OrderStatus::EnterStart;
        db.save_order(&stuck).unwrap();
    }

    let db: Arc<dyn OrderDb> = Arc::new(WalDb::open(&db_dir).unwrap());
    let h = build_dispatcher(
        Arc::clone(&db),
        &dir.path().join("logs"),
        1,
        100,
        SpecService::new(0),
    );

    let record = db.get_order(&OrderId::new("o-stuck")).unwrap().unwrap();
    assert!(record.is_closed(), "stranded order is closed at startup");
    h.dispatcher.shutdown();
}

#[test]
fn in_flight_tasks_are_reset_to_go_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("db");

    {
        let db = WalDb::open(&db_dir).unwrap();
        let order_id = seed_previous_run(&db, 2);
        // One of the two was mid-execution when the crash hit.
        let mut claimed = db.get_task(&TaskId::new("t-000")).unwrap().unwrap();
        claimed.status = TaskStatus::InProgress;
        db.save_task(&claimed).unwrap();
        let _ = order_id;
    }

    let db: Arc<dyn OrderDb> = Arc::new(WalDb::open(&db_dir).unwrap());
    let service = SpecService::new(0);
    let probe = Arc::clone(&service.probe);
    let h = build_dispatcher(Arc::clone(&db), &dir.path().join("logs"), 2, 100, service);

    // Both tasks are eligible again and run to completion.
    h.dispatcher.fill_queue(SPEC_QUEUE).unwrap();
    wait_for_order_status(&*db, &OrderId::new("o-recovered"), OrderStatus::Completed);
    assert_eq!(probe.runs(), 2);
    h.dispatcher.shutdown();
}
