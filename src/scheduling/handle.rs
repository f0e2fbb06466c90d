use std::sync::Arc;
use std::time::Duration;

use super::{Task, TaskPriority, TaskType, TaskUid};

/// Shared-ownership reference to a task or a group.
///
/// The scheduler holds one from submission to completion, groups hold one
/// per child, and callers keep one around to wait or fetch results. The
/// task is destroyed when the last handle drops.
#[derive(Clone)]
pub struct TaskHandle {
    task: Arc<dyn Task>,
}

impl TaskHandle {
    pub fn new(task: Arc<dyn Task>) -> Self {
        Self { task }
    }

    /// Access to the underlying task object.
    pub fn inner(&self) -> &Arc<dyn Task> {
        &self.task
    }

    pub fn uid(&self) -> TaskUid {
        self.task.uid()
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn priority(&self) -> TaskPriority {
        self.task.priority()
    }

    pub fn effective_priority(&self) -> TaskPriority {
        self.task.effective_priority()
    }

    pub fn task_type(&self) -> TaskType {
        self.task.task_type()
    }

    pub fn try_grab(&self) -> bool {
        self.task.try_grab()
    }

    pub fn is_grabbed(&self) -> bool {
        self.task.is_grabbed()
    }

    pub fn is_done(&self) -> bool {
        self.task.is_done()
    }

    pub fn execute(&self) {
        self.task.execute();
    }

    pub fn execute_single_threaded(&self) {
        self.task.execute_single_threaded();
    }

    pub fn wait(&self) {
        self.task.wait();
    }

    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.task.wait_for(timeout)
    }

    pub fn active_wait(&self) {
        self.task.active_wait();
    }
}

impl<T: Task + 'static> From<Arc<T>> for TaskHandle {
    fn from(task: Arc<T>) -> Self {
        Self { task }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("uid", &self.uid())
            .field("name", &self.name())
            .field("done", &self.is_done())
            .finish()
    }
}
