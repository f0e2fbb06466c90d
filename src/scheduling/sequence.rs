//! Ordered group: children run strictly in insertion order, each starting
//! only after the previous one completed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::{
    GroupContext, NoGroupContext, Task, TaskCore, TaskGroup, TaskHandle, TaskPriority,
    TaskScheduler, TaskType,
};

/// Builds a chain `[T0] -> [T1] -> ... -> [Tn]` where each task is
/// submitted to the scheduler once its predecessor is done.
///
/// Composition is not thread-safe: finish adding children before
/// scheduling the group.
pub struct SequenceTaskGroup<C: GroupContext = NoGroupContext> {
    core: TaskCore,
    context: C,
    scheduler: Arc<TaskScheduler>,
    self_ref: Weak<dyn TaskGroup>,
    children: Mutex<Vec<TaskHandle>>,
    current_index: AtomicUsize,
    /// Set while `execute_single_threaded` drives the children inline;
    /// completion callbacks must not push anything to the scheduler then.
    inline_run: AtomicBool,
}

impl SequenceTaskGroup<NoGroupContext> {
    pub fn new(
        scheduler: &Arc<TaskScheduler>,
        name: impl Into<String>,
        priority: TaskPriority,
        task_type: TaskType,
    ) -> Arc<Self> {
        Self::with_context(scheduler, name, priority, task_type, NoGroupContext)
    }
}

impl<C: GroupContext> SequenceTaskGroup<C> {
    pub fn with_context(
        scheduler: &Arc<TaskScheduler>,
        name: impl Into<String>,
        priority: TaskPriority,
        task_type: TaskType,
        context: C,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let self_ref: Weak<dyn TaskGroup> = weak.clone();
            Self {
                core: TaskCore::new(name.into(), priority, task_type),
                context,
                scheduler: scheduler.clone(),
                self_ref,
                children: Mutex::new(Vec::new()),
                current_index: AtomicUsize::new(0),
                inline_run: AtomicBool::new(false),
            }
        })
    }

    fn child_at(&self, index: usize) -> Option<TaskHandle> {
        self.children.lock().unwrap().get(index).cloned()
    }

    fn finish_group(&self) {
        self.context.on_post_execute(self);
        self.core.finish();
    }
}

impl<C: GroupContext> Task for SequenceTaskGroup<C> {
    fn base(&self) -> &TaskCore {
        &self.core
    }

    fn execute(&self) {
        self.context.on_pre_execute(self);
        self.current_index.store(0, Ordering::SeqCst);

        match self.child_at(0) {
            Some(first) => {
                self.scheduler.add(first);
            }
            None => self.finish_group(),
        }
    }

    fn execute_single_threaded(&self) {
        if !self.core.try_grab() {
            return;
        }
        self.context.on_pre_execute(self);
        let children = self.children.lock().unwrap().clone();
        if children.is_empty() {
            self.finish_group();
            return;
        }

        // The cursor advances through child_done exactly as in the
        // scheduled path; the last child's completion finishes the group.
        self.inline_run.store(true, Ordering::SeqCst);
        self.current_index.store(0, Ordering::SeqCst);
        for child in &children {
            child.execute_single_threaded();
        }
        self.inline_run.store(false, Ordering::SeqCst);
    }

    fn active_wait(&self) {
        tracing::warn!(
            "active wait is not supported on groups, falling back to wait for {:?}",
            self.core.name()
        );
        self.core.wait();
    }
}

impl<C: GroupContext> TaskGroup for SequenceTaskGroup<C> {
    fn add_task(&self, child: TaskHandle) {
        assert!(
            !self.core.is_grabbed(),
            "cannot add tasks to group {:?} once it is scheduled",
            self.core.name()
        );
        child.inner().set_parent_group(self.self_ref.clone());
        self.children.lock().unwrap().push(child.clone());
        self.context.on_task_added(self, &child);
    }

    fn child_done(&self) {
        let next = self.current_index.fetch_add(1, Ordering::SeqCst) + 1;
        match self.child_at(next) {
            Some(child) => {
                if !self.inline_run.load(Ordering::SeqCst) {
                    self.scheduler.add(child);
                }
            }
            None => self.finish_group(),
        }
    }

    fn is_empty(&self) -> bool {
        self.children.lock().unwrap().is_empty()
    }

    fn child_count(&self) -> usize {
        self.children.lock().unwrap().len()
    }
}

/// Creates a waitable sequence group bound to `scheduler`.
pub fn make_sequence_group(
    scheduler: &Arc<TaskScheduler>,
    name: impl Into<String>,
    priority: TaskPriority,
) -> Arc<SequenceTaskGroup> {
    SequenceTaskGroup::new(scheduler, name, priority, TaskType::Waitable)
}
