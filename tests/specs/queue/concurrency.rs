//! Bounded parallelism and idle detection.

use crate::prelude::wait_until;
use convoy_queue::{JobSpec, QueueConfig, WorkQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn five_jobs_two_workers_run_two_at_a_time() {
    let queue = WorkQueue::new(QueueConfig::new(2)).unwrap();
    let empty_events = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&empty_events);
    queue.queue_empty_event().listen(move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
    });

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        let completed = Arc::clone(&completed);
        queue
            .enqueue(JobSpec::call(move |_| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(100));
                active.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
    }

    wait_until("all five jobs to complete", || {
        completed.load(Ordering::SeqCst) == 5
    });
    wait_until("the queue empty event", || {
        empty_events.load(Ordering::SeqCst) >= 1
    });

    assert_eq!(peak.load(Ordering::SeqCst), 2, "exactly two jobs run at once");
    // One idle transition, observed exactly once.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(empty_events.load(Ordering::SeqCst), 1);
    assert_eq!(queue.len(), 0);
}

#[test]
fn force_start_admits_past_the_cap() {
    let queue = WorkQueue::new(QueueConfig::new(1)).unwrap();
    let (hold_tx, hold_rx) = mpsc::channel::<()>();
    let (ran_tx, ran_rx) = mpsc::channel();

    queue
        .enqueue(JobSpec::call(move |_| {
            let _ = hold_rx.recv_timeout(Duration::from_secs(10));
            Ok(())
        }))
        .unwrap();

    queue
        .priority_enqueue(
            JobSpec::call(move |_| {
                let _ = ran_tx.send(());
                Ok(())
            }),
            true,
        )
        .unwrap();

    // The forced job finishes while the occupier still holds the only slot.
    assert!(ran_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    let _ = hold_tx.send(());
    queue.wait_until_done();
}

#[test]
fn pause_batches_enqueues_before_dispatch() {
    let queue = WorkQueue::new(QueueConfig::new(4)).unwrap();
    queue.pause();

    let completed = Arc::new(AtomicUsize::new(0));
    for _ in 0..4 {
        let completed = Arc::clone(&completed);
        queue
            .enqueue(JobSpec::call(move |_| {
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
    }

    // Nothing dispatches while paused.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(queue.len(), 4);

    queue.unpause();
    queue.wait_until_done();
    assert_eq!(completed.load(Ordering::SeqCst), 4);
}
