//! Fork/join group: children run concurrently, the group completes when
//! the last of them does.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::{
    GroupContext, NoGroupContext, Task, TaskCore, TaskGroup, TaskHandle, TaskPriority,
    TaskScheduler, TaskType,
};

/// Runs its children concurrently on the scheduler it was created
/// against. An optional `max_simultaneous` cap bounds how many children
/// are in flight at once; each completion submits the next pending child,
/// which realizes bounded parallelism local to this group (the cap does
/// not apply transitively to nested groups).
pub struct ParallelTaskGroup<C: GroupContext = NoGroupContext> {
    core: TaskCore,
    context: C,
    scheduler: Arc<TaskScheduler>,
    self_ref: Weak<dyn TaskGroup>,
    children: Mutex<Vec<TaskHandle>>,
    remaining: AtomicUsize,
    next_to_submit: AtomicUsize,
    max_simultaneous: usize,
    /// Set while `execute_single_threaded` drives the children inline;
    /// completion callbacks must not push anything to the scheduler then.
    inline_run: AtomicBool,
}

impl ParallelTaskGroup<NoGroupContext> {
    /// `max_simultaneous == 0` means uncapped.
    pub fn new(
        scheduler: &Arc<TaskScheduler>,
        name: impl Into<String>,
        priority: TaskPriority,
        task_type: TaskType,
        reserved_children: usize,
        max_simultaneous: usize,
    ) -> Arc<Self> {
        Self::with_context(
            scheduler,
            name,
            priority,
            task_type,
            reserved_children,
            max_simultaneous,
            NoGroupContext,
        )
    }
}

impl<C: GroupContext> ParallelTaskGroup<C> {
    pub fn with_context(
        scheduler: &Arc<TaskScheduler>,
        name: impl Into<String>,
        priority: TaskPriority,
        task_type: TaskType,
        reserved_children: usize,
        max_simultaneous: usize,
        context: C,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let self_ref: Weak<dyn TaskGroup> = weak.clone();
            Self {
                core: TaskCore::new(name.into(), priority, task_type),
                context,
                scheduler: scheduler.clone(),
                self_ref,
                children: Mutex::new(Vec::with_capacity(reserved_children)),
                remaining: AtomicUsize::new(0),
                next_to_submit: AtomicUsize::new(0),
                max_simultaneous,
                inline_run: AtomicBool::new(false),
            }
        })
    }

    pub fn max_simultaneous(&self) -> usize {
        self.max_simultaneous
    }

    fn finish_group(&self) {
        self.context.on_post_execute(self);
        self.core.finish();
    }
}

impl<C: GroupContext> Task for ParallelTaskGroup<C> {
    fn base(&self) -> &TaskCore {
        &self.core
    }

    fn execute(&self) {
        self.context.on_pre_execute(self);

        let children = self.children.lock().unwrap().clone();
        if children.is_empty() {
            self.finish_group();
            return;
        }

        self.remaining.store(children.len(), Ordering::SeqCst);
        let initial = match self.max_simultaneous {
            0 => children.len(),
            cap => cap.min(children.len()),
        };
        self.next_to_submit.store(initial, Ordering::SeqCst);

        tracing::trace!(
            "parallel group {:?} dispatching {initial} of {} children",
            self.core.name(),
            children.len()
        );
        for child in &children[..initial] {
            self.scheduler.add(child.clone());
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

        // Every child finishing notifies us through child_done, so the
        // group completes off the same counting as the scheduled path.
        self.inline_run.store(true, Ordering::SeqCst);
        self.remaining.store(children.len(), Ordering::SeqCst);
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

impl<C: GroupContext> TaskGroup for ParallelTaskGroup<C> {
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
        if self.max_simultaneous != 0 && !self.inline_run.load(Ordering::SeqCst) {
            let next = self.next_to_submit.fetch_add(1, Ordering::SeqCst);
            let pending = {
                let children = self.children.lock().unwrap();
                children.get(next).cloned()
            };
            if let Some(child) = pending {
                self.scheduler.add(child);
            }
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish_group();
        }
    }

    fn is_empty(&self) -> bool {
        self.children.lock().unwrap().is_empty()
    }

    fn child_count(&self) -> usize {
        self.children.lock().unwrap().len()
    }
}

/// Creates a waitable parallel group bound to `scheduler`.
pub fn make_parallel_group(
    scheduler: &Arc<TaskScheduler>,
    name: impl Into<String>,
    priority: TaskPriority,
    reserved_children: usize,
    max_simultaneous: usize,
) -> Arc<ParallelTaskGroup> {
    ParallelTaskGroup::new(
        scheduler,
        name,
        priority,
        TaskType::Waitable,
        reserved_children,
        max_simultaneous,
    )
}

#[cfg(test)]
mod test_parallel_group {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::scheduling::make_task;

    use super::*;

    #[test]
    fn empty_group_completes_on_execute() {
        let scheduler = TaskScheduler::new();
        let group = make_parallel_group(&scheduler, "empty", TaskPriority::Normal, 0, 0);

        assert!(group.is_empty());
        assert!(group.try_grab());
        group.execute();
        assert!(group.is_done());
    }

    #[test]
    fn single_threaded_execution_runs_every_child() {
        let scheduler = TaskScheduler::new();
        let group = make_parallel_group(&scheduler, "st", TaskPriority::Normal, 4, 0);

        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..4 {
            let counter = counter.clone();
            group.add_task(TaskHandle::from(make_task(
                format!("st-{i}"),
                TaskPriority::Inherit,
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            )));
        }

        assert_eq!(group.child_count(), 4);
        group.execute_single_threaded();

        assert!(group.is_done());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    #[should_panic(expected = "already bound to a group")]
    fn reparenting_a_child_is_fatal() {
        let scheduler = TaskScheduler::new();
        let first = make_parallel_group(&scheduler, "first", TaskPriority::Normal, 1, 0);
        let second = make_parallel_group(&scheduler, "second", TaskPriority::Normal, 1, 0);

        let child = TaskHandle::from(make_task("shared", TaskPriority::Normal, || ()));
        first.add_task(child.clone());
        second.add_task(child);
    }

    #[test]
    fn children_inherit_the_group_priority() {
        let scheduler = TaskScheduler::new();
        let group =
            make_parallel_group(&scheduler, "prio", TaskPriority::BelowNormal, 1, 0);

        let child = TaskHandle::from(make_task("inheriting", TaskPriority::Inherit, || ()));
        group.add_task(child.clone());

        assert_eq!(child.effective_priority(), TaskPriority::BelowNormal);
    }
}
