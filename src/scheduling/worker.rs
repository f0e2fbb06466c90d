//! A worker owns one thread and loops on the shared queue for work
//! matching its priority mask.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::sync::CountingSemaphore;
use crate::threads::{spawn_attributed, ThreadAttributes};

use super::{SchedulerCore, TaskHandle, WorkerPriority};

/// Describes one or several identical workers to register with the
/// scheduler. A `count > 1` stamps out copies whose thread names get the
/// worker id appended.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub thread_attributes: ThreadAttributes,
    pub priorities: WorkerPriority,
    pub count: usize,
}

impl WorkerConfig {
    pub fn new(name: impl Into<String>, priorities: WorkerPriority, count: usize) -> Self {
        Self {
            thread_attributes: ThreadAttributes::named(name),
            priorities,
            count,
        }
    }
}

/// After this many back-to-back priority mismatches the worker yields its
/// timeslice before looking at the queue again, bounding requeue
/// ping-pong across heterogeneous pools.
const MAX_CONSECUTIVE_REJECTIONS: u32 = 8;

/// The part of a worker both its thread and the scheduler touch.
pub(crate) struct WorkerShared {
    pub(crate) id: usize,
    pub(crate) name: String,
    pub(crate) priorities: WorkerPriority,
    /// Counting wake-up signal: one credit per queued task routed here.
    pub(crate) wakeup: CountingSemaphore,
    pub(crate) stop: AtomicBool,
    /// The handle currently being executed, if any.
    pub(crate) current: Mutex<Option<TaskHandle>>,
}

pub(crate) struct Worker {
    pub(crate) shared: Arc<WorkerShared>,
    pub(crate) attributes: ThreadAttributes,
    pub(crate) join: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn new(id: usize, config: &WorkerConfig) -> Self {
        let mut attributes = config.thread_attributes.clone();
        attributes.name = format!("{}{}", attributes.name, id);

        Self {
            shared: Arc::new(WorkerShared {
                id,
                name: attributes.name.clone(),
                priorities: config.priorities,
                wakeup: CountingSemaphore::new(0),
                stop: AtomicBool::new(false),
                current: Mutex::new(None),
            }),
            attributes,
            join: None,
        }
    }

    pub(crate) fn start(&mut self, core: Arc<SchedulerCore>) -> io::Result<()> {
        let shared = self.shared.clone();
        let handle = spawn_attributed(&self.attributes, move || worker_loop(&shared, &core))?;
        self.join = Some(handle);
        Ok(())
    }
}

fn worker_loop(shared: &Arc<WorkerShared>, core: &Arc<SchedulerCore>) {
    tracing::debug!("worker {:?} started", shared.name);

    let mut rejections = 0u32;
    'running: loop {
        shared.wakeup.wait();
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        loop {
            if shared.stop.load(Ordering::Acquire) {
                break 'running;
            }

            let Ok(handle) = core.queue().pop() else {
                break;
            };

            let priority = handle.effective_priority();
            if !shared.priorities.can_work_on(priority) {
                tracing::trace!(
                    "worker {:?} cannot take task {:?} at {:?}, requeueing",
                    shared.name,
                    handle.name(),
                    priority
                );
                core.requeue(handle, shared.id);
                rejections += 1;
                if rejections >= MAX_CONSECUTIVE_REJECTIONS {
                    rejections = 0;
                    std::thread::yield_now();
                }
                break;
            }
            rejections = 0;

            tracing::trace!("worker {:?} picked task {:?}", shared.name, handle.name());
            *shared.current.lock().unwrap() = Some(handle.clone());
            if handle.try_grab() {
                handle.execute();
            }
            *shared.current.lock().unwrap() = None;
        }
    }

    tracing::debug!("worker {:?} stopped", shared.name);
}
