//! The task base state shared by units and groups, the [`Task`] trait, and
//! the unit task wrapping a callable payload.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use super::{
    Notifier, TaskContext, TaskError, TaskGroup, TaskPriority, TaskType, TaskUid, NoTaskContext,
};

/// State every kind of task carries: identity, priority, the grabbed/done
/// flags, the completion signal, and the back-reference to an owning
/// group.
///
/// The parent reference is weak: a group owns its children, never the
/// other way around. It is only upgraded while propagating completion,
/// which the group is guaranteed to outlive since its own completion
/// requires every child to be done first.
pub struct TaskCore {
    uid: TaskUid,
    name: String,
    priority: TaskPriority,
    task_type: TaskType,
    grabbed: AtomicBool,
    done: AtomicBool,
    parent: Mutex<Option<Weak<dyn TaskGroup>>>,
    notifier: Notifier,
}

impl TaskCore {
    pub(crate) fn new(name: String, priority: TaskPriority, task_type: TaskType) -> Self {
        Self {
            uid: TaskUid::next(),
            name,
            priority,
            task_type,
            grabbed: AtomicBool::new(false),
            done: AtomicBool::new(false),
            parent: Mutex::new(None),
            notifier: Notifier::new(task_type),
        }
    }

    pub fn uid(&self) -> TaskUid {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Claims the exclusive right to execute the task. Exactly one caller
    /// ever wins this race.
    pub fn try_grab(&self) -> bool {
        self.grabbed
            .compare_exchange(
                false,
                true,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn wait(&self) {
        self.notifier.wait(&self.name);
    }

    pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
        self.notifier.wait_for(&self.name, timeout)
    }

    pub(crate) fn set_parent(&self, parent: Weak<dyn TaskGroup>) {
        let mut slot = self.parent.lock().unwrap();
        assert!(
            slot.is_none(),
            "task {:?} is already bound to a group",
            self.name
        );
        *slot = Some(parent);
    }

    pub fn parent_group(&self) -> Option<Arc<dyn TaskGroup>> {
        self.parent.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    /// Final transition: mark done (release), wake waiters, then tell the
    /// parent group. Called exactly once, by whoever executed the task.
    pub(crate) fn finish(&self) {
        self.done.store(true, Ordering::Release);
        self.notifier.notify();
        if let Some(parent) = self.parent_group() {
            parent.child_done();
        }
    }
}

/// Uniform surface of unit tasks and groups. Dynamic dispatch happens only
/// at this boundary (through [`TaskHandle`](super::TaskHandle)); everything
/// underneath is monomorphized.
pub trait Task: Send + Sync {
    /// The shared base state. Also the extension point contexts can reach
    /// identity information through.
    fn base(&self) -> &TaskCore;

    /// Runs the payload. The caller must have grabbed the task.
    fn execute(&self);

    /// Grabs and runs inline on the calling thread; loses the grab race
    /// silently. Serial/debug execution path.
    fn execute_single_threaded(&self);

    /// Runs the task on the calling thread if it can still be grabbed,
    /// otherwise waits for whoever won.
    fn active_wait(&self);

    fn uid(&self) -> TaskUid {
        self.base().uid()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn priority(&self) -> TaskPriority {
        self.base().priority()
    }

    fn task_type(&self) -> TaskType {
        self.base().task_type()
    }

    /// The priority dispatch actually uses: `Inherit` resolves through the
    /// parent chain and defaults to `Normal` without a parent.
    fn effective_priority(&self) -> TaskPriority {
        match self.base().priority() {
            TaskPriority::Inherit => self
                .base()
                .parent_group()
                .map(|parent| parent.effective_priority())
                .unwrap_or(TaskPriority::Normal),
            priority => priority,
        }
    }

    fn try_grab(&self) -> bool {
        self.base().try_grab()
    }

    fn is_grabbed(&self) -> bool {
        self.base().is_grabbed()
    }

    fn is_done(&self) -> bool {
        self.base().is_done()
    }

    /// Blocks until the task is done. Panics on a fire-and-forget task.
    fn wait(&self) {
        self.base().wait();
    }

    /// Bounded wait; `true` iff completion was observed in the window.
    fn wait_for(&self, timeout: Duration) -> bool {
        self.base().wait_for(timeout)
    }

    fn set_parent_group(&self, parent: Weak<dyn TaskGroup>) {
        self.base().set_parent(parent);
    }

    fn parent_group(&self) -> Option<Arc<dyn TaskGroup>> {
        self.base().parent_group()
    }
}

/// Result slot of a unit task.
pub enum TaskResult<R> {
    NotSet,
    Set(R),
    /// The payload panicked; there is no value to hand out.
    Aborted,
}

type Payload<R> = Box<dyn FnOnce() -> R + Send + 'static>;

/// A leaf unit of work: a callable payload plus an optional typed result.
///
/// `R` is the payload's return type; `()` payloads simply leave nothing
/// worth fetching in the slot. `C` is the hook bundle composed in at
/// construction.
pub struct UnitTask<R, C: TaskContext = NoTaskContext> {
    core: TaskCore,
    context: C,
    payload: Mutex<Option<Payload<R>>>,
    result: Mutex<TaskResult<R>>,
}

impl<R, C> UnitTask<R, C>
where
    R: Send + 'static,
    C: TaskContext,
{
    pub(crate) fn with_context<F>(
        name: String,
        priority: TaskPriority,
        task_type: TaskType,
        context: C,
        func: F,
    ) -> Arc<Self>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Arc::new(Self {
            core: TaskCore::new(name, priority, task_type),
            context,
            payload: Mutex::new(Some(Box::new(func))),
            result: Mutex::new(TaskResult::NotSet),
        })
    }

    fn invoke(&self) {
        let payload = self
            .payload
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| panic!("task {:?} executed more than once", self.core.name()));

        match panic::catch_unwind(AssertUnwindSafe(payload)) {
            Ok(value) => *self.result.lock().unwrap() = TaskResult::Set(value),
            Err(_) => {
                tracing::error!(
                    "payload of task {:?} (uid {}) panicked, completing without a result",
                    self.core.name(),
                    self.core.uid()
                );
                *self.result.lock().unwrap() = TaskResult::Aborted;
            }
        }
    }

    /// Takes the payload's return value out of the slot.
    ///
    /// Calling this before the task is done is a programmer error and
    /// panics. An [`Err`] means the payload aborted or the value was
    /// already taken.
    pub fn result(&self) -> Result<R, TaskError> {
        assert!(
            self.core.is_done(),
            "trying to take the result of unfinished task {:?}",
            self.core.name()
        );
        match std::mem::replace(&mut *self.result.lock().unwrap(), TaskResult::NotSet) {
            TaskResult::Set(value) => Ok(value),
            TaskResult::Aborted => Err(TaskError::Aborted),
            TaskResult::NotSet => Err(TaskError::ResultAlreadyTaken),
        }
    }

    /// [`wait`](Task::wait) followed by [`result`](Self::result).
    pub fn wait_for_result(&self) -> Result<R, TaskError> {
        self.core.wait();
        self.result()
    }
}

impl<R, C> Task for UnitTask<R, C>
where
    R: Send + 'static,
    C: TaskContext,
{
    fn base(&self) -> &TaskCore {
        &self.core
    }

    fn execute(&self) {
        self.context.on_pre_execute(self);
        self.invoke();
        self.context.on_post_execute(self);
        self.core.finish();
    }

    fn execute_single_threaded(&self) {
        if self.core.try_grab() {
            self.execute();
        }
    }

    fn active_wait(&self) {
        if self.core.try_grab() {
            self.execute();
        } else {
            self.core.wait();
        }
    }
}

/// Creates a waitable task. Not yet known to any scheduler; wrap it in a
/// [`TaskHandle`](super::TaskHandle) and submit it, or run it through
/// [`Task::execute_single_threaded`]/[`Task::active_wait`].
pub fn make_task<R, F>(
    name: impl Into<String>,
    priority: TaskPriority,
    func: F,
) -> Arc<UnitTask<R>>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    UnitTask::with_context(name.into(), priority, TaskType::Waitable, NoTaskContext, func)
}

/// Creates a task nobody may wait on.
pub fn make_fire_and_forget_task<R, F>(
    name: impl Into<String>,
    priority: TaskPriority,
    func: F,
) -> Arc<UnitTask<R>>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    UnitTask::with_context(
        name.into(),
        priority,
        TaskType::FireAndForget,
        NoTaskContext,
        func,
    )
}

/// [`make_task`] with a caller-supplied hook bundle.
pub fn make_task_with_context<R, C, F>(
    name: impl Into<String>,
    priority: TaskPriority,
    context: C,
    func: F,
) -> Arc<UnitTask<R, C>>
where
    R: Send + 'static,
    C: TaskContext,
    F: FnOnce() -> R + Send + 'static,
{
    UnitTask::with_context(name.into(), priority, TaskType::Waitable, context, func)
}
