//! Named-job deduplication under contention.

use convoy_queue::{JobSpec, QueueConfig, WorkQueue};
use std::sync::Arc;
use std::thread;

#[test]
fn one_hundred_concurrent_enqueue_or_ignore_admit_exactly_one() {
    let queue = Arc::new(WorkQueue::new(QueueConfig::new(1)).unwrap());
    // Keep the named job pending so every racer sees it.
    queue.pause();

    let mut racers = Vec::new();
    for _ in 0..100 {
        let queue = Arc::clone(&queue);
        racers.push(thread::spawn(move || {
            queue
                .enqueue_or_ignore(JobSpec::call(|_| Ok(())).named("x"))
                .map(|slot| slot.is_some())
                .unwrap_or(false)
        }));
    }

    let admitted = racers
        .into_iter()
        .map(|handle| handle.join())
        .filter(|result| matches!(result, Ok(true)))
        .count();

    assert_eq!(admitted, 1, "exactly one racer wins the name");
    assert_eq!(queue.len(), 1);

    queue.unpause();
    queue.wait_until_done();

    // Once the named job has left the queue, the name is free again.
    let readmitted = queue
        .enqueue_or_ignore(JobSpec::call(|_| Ok(())).named("x"))
        .unwrap();
    assert!(readmitted.is_some());
    queue.wait_until_done();
}

#[test]
fn different_names_do_not_collide() {
    let queue = WorkQueue::new(QueueConfig::new(1)).unwrap();
    queue.pause();

    for i in 0..5 {
        let admitted = queue
            .enqueue_or_ignore(JobSpec::call(|_| Ok(())).named(format!("host-{i}")))
            .unwrap();
        assert!(admitted.is_some());
    }
    assert_eq!(queue.len(), 5);

    queue.unpause();
    queue.wait_until_done();
}
