//! Per-job retry semantics.

use convoy_queue::{JobOutcome, JobSpec, QueueConfig, WorkError, WorkQueue};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn job_that_fails_twice_succeeds_on_the_third_attempt() {
    let queue = WorkQueue::new(QueueConfig::new(1)).unwrap();
    let errors = Arc::new(AtomicUsize::new(0));
    let successes = Arc::new(AtomicUsize::new(0));
    let aborts = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&errors);
    queue.job_error_event().listen(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let seen = Arc::clone(&successes);
    queue.job_succeeded_event().listen(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let seen = Arc::clone(&aborts);
    queue.job_aborted_event().listen(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    queue.pause();
    let attempts = AtomicU32::new(0);
    let (tx, rx) = mpsc::channel();
    let job = queue
        .enqueue(
            JobSpec::call(move |_| {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(WorkError::Failed("device busy".into()))
                } else {
                    Ok(())
                }
            })
            .attempts(3),
        )
        .unwrap();
    let handle = job.clone();
    job.done_event().listen(move |outcome| {
        let _ = tx.send((*outcome, handle.failures()));
    });
    queue.unpause();

    let (outcome, failures) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, JobOutcome::Succeeded);
    assert_eq!(failures, 2);
    assert_eq!(errors.load(Ordering::SeqCst), 2);
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(aborts.load(Ordering::SeqCst), 0);
}

#[test]
fn job_that_always_fails_exhausts_its_budget() {
    let queue = WorkQueue::new(QueueConfig::new(1)).unwrap();
    let errors = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors);
    queue.job_error_event().listen(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    queue.pause();
    let (tx, rx) = mpsc::channel();
    let job = queue
        .enqueue(
            JobSpec::call(|_| Err(WorkError::Failed("no route to host".into()))).attempts(4),
        )
        .unwrap();
    job.done_event().listen(move |outcome| {
        let _ = tx.send(*outcome);
    });
    queue.unpause();

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)),
        Ok(JobOutcome::Aborted)
    );
    assert_eq!(errors.load(Ordering::SeqCst), 4);
}

#[test]
fn events_for_a_job_precede_its_removal() {
    let queue = Arc::new(WorkQueue::new(QueueConfig::new(1)).unwrap());
    let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let q = Arc::clone(&queue);
    let log = Arc::clone(&observed);
    queue.job_error_event().listen(move |_| log.lock().push(q.len()));
    let q = Arc::clone(&queue);
    let log = Arc::clone(&observed);
    queue.job_succeeded_event().listen(move |_| log.lock().push(q.len()));
    let q = Arc::clone(&queue);
    let log = Arc::clone(&observed);
    queue.job_aborted_event().listen(move |_| log.lock().push(q.len()));

    queue.pause();
    let (tx, rx) = mpsc::channel();
    let attempts = AtomicU32::new(0);
    let job = queue
        .enqueue(
            JobSpec::call(move |_| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WorkError::Failed("first try".into()))
                } else {
                    Ok(())
                }
            })
            .attempts(2),
        )
        .unwrap();
    job.done_event().listen(move |_| {
        let _ = tx.send(());
    });
    queue.unpause();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let lengths = observed.lock().clone();
    assert_eq!(lengths.len(), 2, "one error and one success event");
    assert!(
        lengths.iter().all(|&len| len >= 1),
        "an event observed an already-empty queue: {lengths:?}"
    );
}
