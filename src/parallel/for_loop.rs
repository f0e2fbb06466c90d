//! The parallel-for builder: turns a partitioner and a per-element
//! function into a parallel group of batch tasks.

use std::sync::Arc;

use crate::scheduling::{
    make_fire_and_forget_task, make_parallel_group, ParallelTaskGroup, TaskGroup, TaskHandle,
    TaskPriority, TaskScheduler,
};

use super::{RangePartitioner, SimplePartitioner};

/// A per-element callback of either shape: `Fn(element_index)` or
/// `Fn(batch_index, element_index)`. The marker parameter `M` lets the
/// builder pick the right call shape at composition time; it is inferred,
/// never written by callers.
pub trait ParallelForFn<M>: Send + Sync + 'static {
    fn call(&self, batch_index: usize, element_index: usize);
}

/// Marker for `Fn(element_index)` callbacks.
pub struct ElementOnly(());

/// Marker for `Fn(batch_index, element_index)` callbacks.
pub struct BatchAndElement(());

impl<F> ParallelForFn<ElementOnly> for F
where
    F: Fn(usize) + Send + Sync + 'static,
{
    fn call(&self, _batch_index: usize, element_index: usize) {
        self(element_index);
    }
}

impl<F> ParallelForFn<BatchAndElement> for F
where
    F: Fn(usize, usize) + Send + Sync + 'static,
{
    fn call(&self, batch_index: usize, element_index: usize) {
        self(batch_index, element_index);
    }
}

/// Builds (without scheduling) a parallel group with one batch task per
/// partitioner batch. Each task drains the shared partitioner:
/// fast batches go back for more ranges, so an uneven workload still
/// saturates the pool. Returns `None` for an invalid partitioner.
pub fn make_parallel_for_group<P, M, F>(
    scheduler: &Arc<TaskScheduler>,
    name: &str,
    partitioner: P,
    priority: TaskPriority,
    func: F,
) -> Option<Arc<ParallelTaskGroup>>
where
    P: RangePartitioner + 'static,
    F: ParallelForFn<M>,
    M: 'static,
{
    if !partitioner.is_valid() {
        tracing::debug!("parallel for {name:?} over an invalid partitioner, nothing to do");
        return None;
    }

    let batch_count = partitioner.batch_count();
    let group = make_parallel_group(
        scheduler,
        format!("{name} ({} items)", partitioner.element_count()),
        priority,
        batch_count,
        0,
    );

    let partitioner = Arc::new(partitioner);
    let func = Arc::new(func);
    for batch_index in 0..batch_count {
        let partitioner = partitioner.clone();
        let func = func.clone();
        let task = make_fire_and_forget_task(
            format!("Batch {}/{}", batch_index + 1, batch_count),
            priority,
            move || {
                while let Some(range) = partitioner.next_range() {
                    for element_index in range {
                        func.call(batch_index, element_index);
                    }
                }
            },
        );
        group.add_task(TaskHandle::from(task));
    }

    Some(group)
}

/// Schedules `func` over `[first, last)` with a simple partitioner sized
/// to the pool's normal-priority workers, and blocks until every element
/// has been visited.
pub fn parallel_for<M, F>(
    scheduler: &Arc<TaskScheduler>,
    name: &str,
    first: usize,
    last: usize,
    func: F,
) where
    F: ParallelForFn<M>,
    M: 'static,
{
    let priority = TaskPriority::Normal;
    let batches = scheduler.workers_count(priority).max(1);
    let partitioner = SimplePartitioner::new(first, last, batches);

    if let Some(group) = make_parallel_for_group(scheduler, name, partitioner, priority, func) {
        scheduler.add(TaskHandle::from(group)).active_wait();
    }
}

/// [`parallel_for`] over the elements of an indexable container: builds a
/// partitioner over `[0, len)` and hands `func` a reference to each
/// element. The container moves into shared ownership across the batch
/// tasks; pass an `Arc<Vec<_>>` to keep a handle on it.
pub fn parallel_for_each<C, T, F>(scheduler: &Arc<TaskScheduler>, name: &str, container: C, func: F)
where
    C: AsRef<[T]> + Send + Sync + 'static,
    T: Sync,
    F: Fn(&T) + Send + Sync + 'static,
{
    let container = Arc::new(container);
    let len = container.as_ref().as_ref().len();
    parallel_for(scheduler, name, 0, len, move |element_index: usize| {
        func(&container.as_ref().as_ref()[element_index]);
    });
}
