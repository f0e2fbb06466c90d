//! Hook bundles composed into tasks and groups at construction time.
//!
//! Contexts observe lifecycle events (execution boundaries, child
//! additions) and receive a back-reference to their owner; telemetry,
//! tracing and timing registries are the intended use. The no-op defaults
//! are zero-sized and monomorphize away entirely.

use super::{Task, TaskGroup, TaskHandle};

/// Hooks invoked around a unit task's execution.
pub trait TaskContext: Send + Sync + 'static {
    fn on_pre_execute(&self, _task: &dyn Task) {}
    fn on_post_execute(&self, _task: &dyn Task) {}
}

/// Hooks invoked around a group's lifecycle.
pub trait GroupContext: Send + Sync + 'static {
    fn on_task_added(&self, _group: &dyn TaskGroup, _child: &TaskHandle) {}
    fn on_pre_execute(&self, _group: &dyn TaskGroup) {}
    fn on_post_execute(&self, _group: &dyn TaskGroup) {}
}

/// Default task context: no hooks.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTaskContext;

impl TaskContext for NoTaskContext {}

/// Default group context: no hooks.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGroupContext;

impl GroupContext for NoGroupContext {}
