//! End-to-end parallel-for scenarios: partitioner-backed groups, the
//! blocking convenience entries, and container iteration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ntest::timeout;

use oqpi::{
    make_parallel_for_group, parallel_for, parallel_for_each, AtomicPartitioner,
    SimplePartitioner, TaskHandle, TaskPriority, TaskScheduler, WorkerConfig, WorkerPriority,
};

fn pool(workers: usize) -> Arc<TaskScheduler> {
    let scheduler = TaskScheduler::new();
    scheduler.register_worker(WorkerConfig::new("pf_worker", WorkerPriority::ANY, workers));
    scheduler.start().expect("worker threads should spawn");
    scheduler
}

#[test]
#[timeout(30000)]
fn visits_every_index_exactly_once() {
    let scheduler = pool(4);
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_in_loop = counter.clone();
    parallel_for(&scheduler, "count_up", 0, 1000, move |_i: usize| {
        counter_in_loop.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(counter.load(Ordering::SeqCst), 1000);
    scheduler.stop();
}

#[test]
#[timeout(30000)]
fn batch_aware_callback_sees_sane_batch_indices() {
    let scheduler = pool(4);
    let batch_count = scheduler.workers_count(TaskPriority::Normal);
    let batches: Arc<Vec<AtomicUsize>> =
        Arc::new((0..batch_count).map(|_| AtomicUsize::new(0)).collect());

    let batches_in_loop = batches.clone();
    parallel_for(
        &scheduler,
        "batched",
        0,
        100,
        move |batch_index: usize, _element_index: usize| {
            batches_in_loop[batch_index].fetch_add(1, Ordering::SeqCst);
        },
    );

    let total: usize = batches.iter().map(|b| b.load(Ordering::SeqCst)).sum();
    assert_eq!(total, 100);

    // Every element was claimed by one of the batch tasks; a fast task may
    // have drained ranges belonging to late starters, so at least one and
    // at most `batch_count` tasks saw work.
    let active = batches
        .iter()
        .filter(|b| b.load(Ordering::SeqCst) > 0)
        .count();
    assert!((1..=batch_count).contains(&active));
    scheduler.stop();
}

#[test]
#[timeout(30000)]
fn empty_range_finishes_immediately() {
    let scheduler = pool(2);
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_in_loop = counter.clone();
    parallel_for(&scheduler, "nothing", 10, 10, move |_i: usize| {
        counter_in_loop.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    scheduler.stop();
}

#[test]
#[timeout(30000)]
fn for_each_hands_out_every_element() {
    let scheduler = pool(4);

    let words = vec![
        "Lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit",
        "Nullam", "nulla", "sapien", "mattis", "egestas", "lobortis", "mauris",
    ];
    let expected: usize = words.iter().map(|w| w.len()).sum();

    let total = Arc::new(AtomicUsize::new(0));
    let total_in_loop = total.clone();
    parallel_for_each(&scheduler, "word_lengths", words, move |word: &&str| {
        total_in_loop.fetch_add(word.len(), Ordering::SeqCst);
    });

    assert_eq!(total.load(Ordering::SeqCst), expected);
    scheduler.stop();
}

#[test]
#[timeout(30000)]
fn atomic_partitioner_covers_uneven_work() {
    let scheduler = pool(4);
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_in_loop = counter.clone();
    let group = make_parallel_for_group(
        &scheduler,
        "uneven",
        AtomicPartitioner::new(0, 333, 16, scheduler.workers_count(TaskPriority::Normal)),
        TaskPriority::Normal,
        move |i: usize| {
            // Uneven per-element cost.
            if i % 50 == 0 {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            counter_in_loop.fetch_add(1, Ordering::SeqCst);
        },
    )
    .expect("valid partitioner");

    scheduler.add(TaskHandle::from(group)).wait();

    assert_eq!(counter.load(Ordering::SeqCst), 333);
    scheduler.stop();
}

#[test]
#[timeout(30000)]
fn explicit_simple_partitioner_group_waits_cleanly() {
    let scheduler = pool(3);
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_in_loop = counter.clone();
    let group = make_parallel_for_group(
        &scheduler,
        "explicit",
        SimplePartitioner::over_count(64, scheduler.workers_count(TaskPriority::Normal)),
        TaskPriority::Normal,
        move |_i: usize| {
            counter_in_loop.fetch_add(1, Ordering::SeqCst);
        },
    )
    .expect("valid partitioner");

    scheduler.add(TaskHandle::from(group)).wait();
    assert_eq!(counter.load(Ordering::SeqCst), 64);
    scheduler.stop();
}
