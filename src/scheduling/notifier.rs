// Completion signal of a task. Only waitable tasks carry an event; a
// fire-and-forget task has nothing to wait on and says so loudly.

use std::time::Duration;

use crate::sync::ManualResetEvent;

use super::TaskType;

pub(crate) enum Notifier {
    FireAndForget,
    /// Manual-reset so late waiters still observe completion.
    Waitable(ManualResetEvent),
}

impl Notifier {
    pub(crate) fn new(task_type: TaskType) -> Self {
        match task_type {
            TaskType::FireAndForget => Self::FireAndForget,
            TaskType::Waitable => Self::Waitable(ManualResetEvent::new()),
        }
    }

    pub(crate) fn notify(&self) {
        if let Self::Waitable(event) = self {
            event.notify();
        }
    }

    pub(crate) fn wait(&self, task_name: &str) {
        match self {
            Self::Waitable(event) => event.wait(),
            Self::FireAndForget => {
                panic!("cannot wait on fire-and-forget task {task_name:?}")
            }
        }
    }

    pub(crate) fn wait_for(&self, task_name: &str, timeout: Duration) -> bool {
        match self {
            Self::Waitable(event) => event.wait_for(timeout),
            Self::FireAndForget => {
                panic!("cannot wait on fire-and-forget task {task_name:?}")
            }
        }
    }
}
