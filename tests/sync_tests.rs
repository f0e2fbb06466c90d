//! Cross-thread behavior of the synchronization primitives and the named
//! object registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ntest::timeout;

use oqpi::{
    wait_indefinitely_for_any, AutoResetEvent, CountingSemaphore, ManualResetEvent, SyncError,
    SyncMutex, SyncObjectCreationMode, WaitAny,
};

#[test]
#[timeout(10000)]
fn manual_reset_event_round_trip() {
    let event = ManualResetEvent::new();

    // Repeated notification is idempotent; the signal persists.
    event.notify();
    event.notify();
    event.wait();
    assert!(event.wait_for(Duration::ZERO));

    event.reset();
    assert!(!event.wait_for(Duration::ZERO));
}

#[test]
#[timeout(10000)]
fn auto_reset_event_releases_one_waiter_per_notify() {
    let event = AutoResetEvent::new();
    let released = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let event = event.clone();
            let released = released.clone();
            thread::spawn(move || {
                event.wait();
                released.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(released.load(Ordering::SeqCst), 0);

    for expected in 1..=3 {
        event.notify();
        while released.load(Ordering::SeqCst) < expected {
            thread::yield_now();
        }
        // Exactly `expected` waiters through so far.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(released.load(Ordering::SeqCst), expected);
    }

    for waiter in waiters {
        waiter.join().expect("should safely join");
    }
}

#[test]
#[timeout(10000)]
fn semaphore_choreography_matches_its_bounds() {
    let semaphore = CountingSemaphore::with_max(2, 3);

    assert!(semaphore.try_wait());
    assert!(semaphore.try_wait());
    assert!(!semaphore.try_wait());

    assert!(semaphore.notify_one());
    assert!(semaphore.try_wait());

    semaphore.notify_all();
    assert!(semaphore.try_wait() && semaphore.try_wait() && semaphore.try_wait());
    assert!(!semaphore.try_wait());
}

#[test]
#[timeout(10000)]
fn named_semaphore_is_one_object_across_handles() {
    let created = CountingSemaphore::named(
        "/it-sem",
        SyncObjectCreationMode::CreateIfNonexistent,
        2,
        3,
    )
    .expect("fresh name");

    assert!(matches!(
        CountingSemaphore::named("/it-sem", SyncObjectCreationMode::CreateIfNonexistent, 0, 1),
        Err(SyncError::AlreadyExists(_))
    ));

    let opened = CountingSemaphore::named("/it-sem", SyncObjectCreationMode::OpenExisting, 0, 1)
        .expect("open existing");

    assert!(created.try_wait());
    assert!(opened.try_wait());
    assert!(!opened.try_wait());

    opened.notify_one();
    assert!(created.try_wait());
}

#[test]
#[timeout(10000)]
fn open_existing_fails_without_a_live_object() {
    assert!(matches!(
        ManualResetEvent::named("/it-ghost", SyncObjectCreationMode::OpenExisting),
        Err(SyncError::NotFound(_))
    ));
}

#[test]
#[timeout(10000)]
fn mutex_serializes_cross_thread_increments() {
    let mutex = SyncMutex::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mutex = mutex.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let _guard = mutex.lock();
                    let seen = counter.load(Ordering::SeqCst);
                    counter.store(seen + 1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("should safely join");
    }
    assert_eq!(counter.load(Ordering::SeqCst), 400);
}

#[test]
#[timeout(10000)]
fn wait_for_any_picks_the_signaled_object() {
    let manual = ManualResetEvent::new();
    let auto = AutoResetEvent::new();
    let semaphore = CountingSemaphore::new(0);

    let manual_clone = manual.clone();
    let signaler = thread::spawn(move || {
        thread::sleep(Duration::from_millis(40));
        manual_clone.notify();
    });

    let index =
        wait_indefinitely_for_any(&[&auto as &dyn WaitAny, &semaphore, &manual]);
    assert_eq!(index, 2);

    signaler.join().expect("should safely join");
}
