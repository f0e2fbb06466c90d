//! The scheduler: owns the worker pool and the shared dispatch queue,
//! routes submitted handles to priority-compatible workers, and shuts the
//! pool down cleanly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use concurrent_queue::ConcurrentQueue;

use super::{SchedulerError, TaskHandle, TaskPriority, Worker, WorkerConfig, WorkerShared};

struct WorkerSet {
    workers: Vec<Arc<WorkerShared>>,
    /// Cached number of workers admitting each priority level.
    counts: [usize; TaskPriority::LEVELS],
}

/// State shared between the scheduler surface, its workers, and groups
/// submitting their children: the dispatch queue plus the wake-up routing
/// over the registered workers.
pub struct SchedulerCore {
    queue: ConcurrentQueue<TaskHandle>,
    workers: RwLock<WorkerSet>,
    wake_cursor: AtomicUsize,
}

impl SchedulerCore {
    fn new() -> Self {
        Self {
            queue: ConcurrentQueue::unbounded(),
            workers: RwLock::new(WorkerSet {
                workers: Vec::new(),
                counts: [0; TaskPriority::LEVELS],
            }),
            wake_cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn queue(&self) -> &ConcurrentQueue<TaskHandle> {
        &self.queue
    }

    fn register(&self, shared: Arc<WorkerShared>) {
        let mut set = self.workers.write().unwrap();
        set.workers.push(shared);

        let mut counts = [0; TaskPriority::LEVELS];
        for worker in &set.workers {
            for (level, count) in counts.iter_mut().enumerate() {
                if worker.priorities.mask() & (1 << level) != 0 {
                    *count += 1;
                }
            }
        }
        set.counts = counts;
    }

    fn count_for(&self, priority: TaskPriority) -> usize {
        let level = match priority {
            TaskPriority::Inherit => TaskPriority::Normal,
            other => other,
        };
        self.workers.read().unwrap().counts[level as usize]
    }

    fn add(&self, handle: TaskHandle) {
        let priority = handle.effective_priority();
        tracing::trace!(
            "queueing task {:?} (uid {}) at {:?}",
            handle.name(),
            handle.uid(),
            priority
        );
        if let Err(err) = self.queue.push(handle) {
            tracing::error!("failed to queue task: {err}");
            return;
        }
        self.wake_one_for(priority, None);
    }

    /// Puts a handle a worker could not take back on the queue and pokes
    /// a different worker, best-effort.
    pub(crate) fn requeue(&self, handle: TaskHandle, rejecting_worker: usize) {
        let priority = handle.effective_priority();
        if let Err(err) = self.queue.push(handle) {
            tracing::error!("failed to requeue task: {err}");
            return;
        }
        self.wake_one_for(priority, Some(rejecting_worker));
    }

    /// Wakes one worker admitting `priority`, falling back to any worker
    /// so a mismatched pick can still shuffle the task along. A round-robin
    /// cursor spreads wake-ups across the pool.
    fn wake_one_for(&self, priority: TaskPriority, except: Option<usize>) {
        let set = self.workers.read().unwrap();
        let total = set.workers.len();
        if total == 0 {
            return;
        }

        let start = self.wake_cursor.fetch_add(1, Ordering::Relaxed);
        let candidates = (0..total).map(|offset| &set.workers[(start + offset) % total]);

        let mut fallback = None;
        for worker in candidates {
            if Some(worker.id) == except {
                continue;
            }
            if worker.priorities.can_work_on(priority) {
                worker.wakeup.notify_one();
                return;
            }
            fallback.get_or_insert(worker);
        }
        if let Some(worker) = fallback {
            worker.wakeup.notify_one();
        }
    }

    fn wake_all(&self) {
        for worker in &self.workers.read().unwrap().workers {
            worker.wakeup.notify_one();
        }
    }
}

/// The client-facing scheduler. Register workers, start, submit handles,
/// stop.
///
/// Handles may also be submitted while the scheduler is not running; they
/// sit in the queue where an [`active_wait`](super::Task::active_wait) can
/// still claim them.
pub struct TaskScheduler {
    core: Arc<SchedulerCore>,
    workers: Mutex<Vec<Worker>>,
    running: AtomicBool,
}

impl TaskScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: Arc::new(SchedulerCore::new()),
            workers: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }

    /// Registers `config.count` workers. Must happen before [`start`]
    /// (registering into a running pool is a programmer error and panics).
    ///
    /// [`start`]: Self::start
    pub fn register_worker(&self, config: WorkerConfig) {
        assert!(
            !self.is_running(),
            "workers must be registered before the scheduler is started"
        );
        assert!(config.count > 0, "a worker config must request at least one worker");

        let mut workers = self.workers.lock().unwrap();
        for _ in 0..config.count {
            let worker = Worker::new(workers.len(), &config);
            tracing::debug!(
                "registered worker {:?} with mask {:#07b}",
                worker.shared.name,
                worker.shared.priorities.mask()
            );
            self.core.register(worker.shared.clone());
            workers.push(worker);
        }
    }

    /// Starts every registered worker thread.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyStarted);
        }

        let mut workers = self.workers.lock().unwrap();
        for worker in workers.iter() {
            worker.shared.stop.store(false, Ordering::Release);
        }

        for index in 0..workers.len() {
            if let Err(err) = {
                let core = self.core.clone();
                workers[index].start(core)
            } {
                tracing::error!("failed to start worker {index}: {err}");
                self.halt_workers(&mut workers);
                self.running.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        }
        drop(workers);

        // Anything queued before start gets a chance right away.
        if !self.core.queue.is_empty() {
            self.core.wake_all();
        }
        Ok(())
    }

    /// Stops the pool: workers exit after finishing their current task,
    /// threads are joined, and any handle still queued is dropped without
    /// execution — its completion will never be signaled, so do not wait
    /// on tasks submitted around a `stop`.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let mut workers = self.workers.lock().unwrap();
        self.halt_workers(&mut workers);
        drop(workers);

        let mut dropped = 0usize;
        while let Ok(handle) = self.core.queue.pop() {
            tracing::debug!("dropping unexecuted task {:?} on stop", handle.name());
            drop(handle);
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!("scheduler stop dropped {dropped} pending task(s)");
        }
    }

    fn halt_workers(&self, workers: &mut [Worker]) {
        for worker in workers.iter() {
            worker.shared.stop.store(true, Ordering::Release);
        }
        for worker in workers.iter() {
            worker.shared.wakeup.notify_one();
        }
        for worker in workers.iter_mut() {
            if let Some(join) = worker.join.take() {
                if join.join().is_err() {
                    tracing::error!("worker {:?} thread panicked", worker.shared.name);
                }
            }
        }
    }

    /// Submits a handle for execution and returns it for chaining.
    pub fn add(&self, handle: TaskHandle) -> TaskHandle {
        self.core.add(handle.clone());
        handle
    }

    /// Number of registered workers whose mask admits `priority`.
    pub fn workers_count(&self, priority: TaskPriority) -> usize {
        self.core.count_for(priority)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test_task_scheduler {
    use tracing_test::traced_test;

    use crate::scheduling::{make_task, Task, TaskHandle, WorkerPriority};

    use super::*;

    #[test]
    fn counts_workers_per_priority() {
        let scheduler = TaskScheduler::new();
        scheduler.register_worker(WorkerConfig::new("wide", WorkerPriority::ANY, 2));
        scheduler.register_worker(WorkerConfig::new("narrow", WorkerPriority::HIGH, 1));

        assert_eq!(scheduler.workers_count(TaskPriority::High), 3);
        assert_eq!(scheduler.workers_count(TaskPriority::Normal), 2);
        assert_eq!(scheduler.workers_count(TaskPriority::Low), 2);
        // Inherit counts as normal.
        assert_eq!(scheduler.workers_count(TaskPriority::Inherit), 2);
    }

    #[test]
    fn double_start_is_rejected() {
        let scheduler = TaskScheduler::new();
        scheduler.register_worker(WorkerConfig::new("w", WorkerPriority::ANY, 1));

        scheduler.start().expect("first start");
        assert!(matches!(
            scheduler.start(),
            Err(SchedulerError::AlreadyStarted)
        ));
        scheduler.stop();
    }

    #[test]
    #[should_panic(expected = "before the scheduler is started")]
    fn registering_into_a_running_pool_is_fatal() {
        let scheduler = TaskScheduler::new();
        scheduler.register_worker(WorkerConfig::new("w", WorkerPriority::ANY, 1));
        scheduler.start().expect("start");

        scheduler.register_worker(WorkerConfig::new("late", WorkerPriority::ANY, 1));
    }

    #[test]
    #[traced_test]
    fn stopping_leaves_pending_handles_unexecuted() {
        let scheduler = TaskScheduler::new();
        // No workers: nothing will ever pop the queue.
        scheduler.start().expect("start");

        let task = make_task("stranded", TaskPriority::Normal, || ());
        scheduler.add(TaskHandle::from(task.clone()));
        scheduler.stop();

        assert!(!task.is_done());
        assert!(!task.is_grabbed());
        assert!(logs_contain("dropping unexecuted task"));
    }
}
