//! Optional process-wide default scheduler.
//!
//! The primary API is an explicit [`TaskScheduler`]; this module only adds
//! a convenience singleton for programs that want one pool for their whole
//! lifetime. It is never constructed implicitly: the client initializes it
//! once, and shuts it down when done.

use std::sync::{Arc, LazyLock, RwLock};

use crate::scheduling::{SchedulerError, TaskHandle, TaskScheduler, WorkerConfig, WorkerPriority};
use crate::threads::default_worker_count;

static DEFAULT_SCHEDULER: LazyLock<RwLock<Option<Arc<TaskScheduler>>>> =
    LazyLock::new(|| RwLock::new(None));

/// Creates, configures and starts the process-wide scheduler. Fails with
/// [`SchedulerError::AlreadyInitialized`] if one is already up.
pub fn init(
    configs: impl IntoIterator<Item = WorkerConfig>,
) -> Result<Arc<TaskScheduler>, SchedulerError> {
    let mut slot = DEFAULT_SCHEDULER.write().unwrap();
    if slot.is_some() {
        return Err(SchedulerError::AlreadyInitialized);
    }

    let scheduler = TaskScheduler::new();
    for config in configs {
        scheduler.register_worker(config);
    }
    scheduler.start()?;

    *slot = Some(scheduler.clone());
    Ok(scheduler)
}

/// [`init`] with one any-priority worker per hardware thread (or per
/// `OQPI_NUM_THREADS`), the configuration most compute-bound programs
/// want.
pub fn start_default_scheduler() -> Result<Arc<TaskScheduler>, SchedulerError> {
    init([WorkerConfig::new(
        "oqpi_worker",
        WorkerPriority::ANY,
        default_worker_count(),
    )])
}

/// The default scheduler. Panics when [`init`] has not run; use
/// [`try_instance`] to probe.
pub fn instance() -> Arc<TaskScheduler> {
    try_instance().expect("the default scheduler is not initialized")
}

pub fn try_instance() -> Option<Arc<TaskScheduler>> {
    DEFAULT_SCHEDULER.read().unwrap().clone()
}

/// Stops and releases the default scheduler. Safe to call without one.
pub fn shutdown() {
    let scheduler = DEFAULT_SCHEDULER.write().unwrap().take();
    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
}

/// Submits a handle to the default scheduler.
pub fn schedule_task(handle: TaskHandle) -> TaskHandle {
    instance().add(handle)
}

#[cfg(test)]
mod test_toolkit {
    use serial_test::serial;

    use crate::scheduling::{make_task, TaskPriority, WorkerPriority};

    use super::*;

    #[test]
    #[serial]
    fn lifecycle_round_trip() {
        assert!(try_instance().is_none());

        let scheduler = init([WorkerConfig::new("toolkit_worker", WorkerPriority::ANY, 2)])
            .expect("first init");
        assert!(matches!(
            init([]),
            Err(SchedulerError::AlreadyInitialized)
        ));
        assert_eq!(scheduler.workers_count(TaskPriority::Normal), 2);

        let task = make_task("toolkit_task", TaskPriority::Normal, || 11 * 3);
        schedule_task(TaskHandle::from(task.clone()));
        assert_eq!(task.wait_for_result(), Ok(33));

        shutdown();
        assert!(try_instance().is_none());
    }

    #[test]
    #[serial]
    fn shutdown_without_init_is_harmless() {
        shutdown();
        assert!(try_instance().is_none());
    }

    #[test]
    #[serial]
    fn default_scheduler_spans_the_hardware() {
        let scheduler = start_default_scheduler().expect("default init");
        assert!(scheduler.workers_count(TaskPriority::Normal) >= 1);
        assert!(scheduler.is_running());
        shutdown();
    }
}
