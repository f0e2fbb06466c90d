use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Relative priority of a task. Workers advertise which of these they are
/// willing to pick up through their [`WorkerPriority`] mask.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TaskPriority {
    High = 0,
    AboveNormal = 1,
    #[default]
    Normal = 2,
    BelowNormal = 3,
    Low = 4,
    /// Resolves to the parent group's priority at submission time, or to
    /// [`Normal`](Self::Normal) for a parentless task.
    Inherit = 5,
}

impl TaskPriority {
    /// Number of schedulable priority levels (`Inherit` is not one).
    pub const LEVELS: usize = 5;

    pub const fn is_inherit(self) -> bool {
        matches!(self, Self::Inherit)
    }
}

/// Whether a task carries a completion signal others may wait on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TaskType {
    #[default]
    Waitable,
    /// No completion signal; waiting on such a task is a programmer error.
    FireAndForget,
}

/// Process-unique, monotonically increasing task identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskUid(u64);

impl TaskUid {
    pub(crate) fn next() -> Self {
        static NEXT_UID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_UID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitmask over [`TaskPriority`] levels describing which tasks a worker
/// accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPriority(u8);

impl WorkerPriority {
    pub const HIGH: Self = Self(1 << TaskPriority::High as u8);
    pub const ABOVE_NORMAL: Self = Self(1 << TaskPriority::AboveNormal as u8);
    pub const NORMAL: Self = Self(1 << TaskPriority::Normal as u8);
    pub const BELOW_NORMAL: Self = Self(1 << TaskPriority::BelowNormal as u8);
    pub const LOW: Self = Self(1 << TaskPriority::Low as u8);

    pub const ANY_NORMAL: Self =
        Self(Self::ABOVE_NORMAL.0 | Self::NORMAL.0 | Self::BELOW_NORMAL.0);
    pub const NORMAL_OR_LOW: Self = Self(Self::ANY_NORMAL.0 | Self::LOW.0);
    pub const NORMAL_OR_HIGH: Self = Self(Self::ANY_NORMAL.0 | Self::HIGH.0);
    pub const ANY: Self = Self(Self::HIGH.0 | Self::ANY_NORMAL.0 | Self::LOW.0);

    /// Whether a task of `priority` is executable on a worker carrying
    /// this mask.
    pub const fn can_work_on(self, priority: TaskPriority) -> bool {
        ((1 << priority as u8) & self.0) != 0
    }

    pub const fn mask(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for WorkerPriority {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Errors surfaced when interrogating a task's result slot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("the task payload panicked before producing a result")]
    Aborted,

    #[error("the task result was already taken")]
    ResultAlreadyTaken,
}

/// Environmental scheduler failures. Programmer errors (registering after
/// start, re-parenting a task, waiting on fire-and-forget) panic instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn a worker thread")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("the scheduler is already started")]
    AlreadyStarted,

    #[error("the default scheduler is already initialized")]
    AlreadyInitialized,
}
