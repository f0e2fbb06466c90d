//! Task and group object model, the scheduler, and its worker pool.

mod context;
mod group;
mod handle;
mod notifier;
mod parallel;
mod scheduler;
mod sequence;
mod task;
mod types;
mod worker;

pub use context::*;
pub use group::*;
pub use handle::*;
pub(crate) use notifier::Notifier;
pub use parallel::*;
pub use scheduler::*;
pub use sequence::*;
pub use task::*;
pub use types::*;
pub use worker::WorkerConfig;
pub(crate) use worker::{Worker, WorkerShared};
