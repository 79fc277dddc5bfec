//! Order lifecycle end to end over a real database.

use crate::prelude::*;
use convoy_core::OrderStatus;
use convoy_storage::{OrderDb, TaskFilter, WalDb};
use std::sync::Arc;

#[test]
fn order_with_tasks_completes_over_a_wal_database() {
    let dir = tempfile::tempdir().unwrap();
    let db: Arc<dyn OrderDb> = Arc::new(WalDb::open(&dir.path().join("db")).unwrap());
    let service = SpecService::new(3);
    let probe = Arc::clone(&service.probe);
    let h = build_dispatcher(Arc::clone(&db), &dir.path().join("logs"), 2, 100, service);

    let order = h.daemon.submit("fleet", serde_json::json!({"region": "west"}));
    wait_for_order_status(&*db, &order.id(), OrderStatus::Completed);

    assert_eq!(probe.runs(), 3);
    assert_eq!(db.count_tasks(&order.id(), TaskFilter::Open).unwrap(), 0);
    assert_eq!(db.count_tasks(&order.id(), TaskFilter::Closed).unwrap(), 3);

    let record = db.get_order(&order.id()).unwrap().unwrap();
    assert!(record.is_closed());
    h.dispatcher.shutdown();
}

#[test]
fn order_completion_waits_for_every_task() {
    let dir = tempfile::tempdir().unwrap();
    let db: Arc<dyn OrderDb> = Arc::new(WalDb::open(&dir.path().join("db")).unwrap());

    // Three tasks; the service closes the order itself after two have
    // run; the third blocks on the probe's gate.
    let mut service = SpecService::new(3);
    service.gated_last = true;
    service.close_order_after = Some(2);
    let probe = Arc::clone(&service.probe);
    let h = build_dispatcher(Arc::clone(&db), &dir.path().join("logs"), 2, 100, service);

    let order = h.daemon.submit("fleet", serde_json::Value::Null);

    // Two tasks done, order closed by the service, third still open: the
    // dispatcher must not report completion yet.
    wait_until("two tasks to close", || {
        db.count_tasks(&order.id(), TaskFilter::Closed).unwrap_or(0) == 2
    });
    assert!(probe.runs() >= 2);
    assert_eq!(db.count_tasks(&order.id(), TaskFilter::Open).unwrap(), 1);
    assert_ne!(order_status(&*db, &order.id()), Some(OrderStatus::Completed));

    probe.open_gate();
    wait_for_order_status(&*db, &order.id(), OrderStatus::Completed);
    assert_eq!(db.count_tasks(&order.id(), TaskFilter::Open).unwrap(), 0);
    h.dispatcher.shutdown();
}

#[test]
fn order_without_tasks_is_complete_after_enter() {
    let dir = tempfile::tempdir().unwrap();
    let db: Arc<dyn OrderDb> = Arc::new(WalDb::open(&dir.path().join("db")).unwrap());
    let h = build_dispatcher(
        Arc::clone(&db),
        &dir.path().join("logs"),
        1,
        100,
        SpecService::new(0),
    );

    let order = h.daemon.submit("fleet", serde_json::Value::Null);
    wait_for_order_status(&*db, &order.id(), OrderStatus::Completed);
    assert_eq!(db.count_tasks(&order.id(), TaskFilter::Any).unwrap(), 0);
}
