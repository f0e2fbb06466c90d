//! oqpi — a task-scheduling library for compute-heavy applications that
//! need to keep CPU cores busy with short-lived work.
//!
//! Clients submit unit tasks or composite structures (sequence and
//! fork/join groups) to a pool of worker threads; the library handles
//! dispatch, priority matching, waits, and completion notification. A
//! parallel-for construct on top provides data-parallel iteration over
//! index ranges and indexable containers.
//!
//! ```no_run
//! use oqpi::{
//!     make_task, parallel_for, TaskHandle, TaskPriority, TaskScheduler, WorkerConfig,
//!     WorkerPriority,
//! };
//!
//! let scheduler = TaskScheduler::new();
//! scheduler.register_worker(WorkerConfig::new("worker", WorkerPriority::ANY, 4));
//! scheduler.start().expect("worker threads should spawn");
//!
//! let task = make_task("answer", TaskPriority::Normal, || 6 * 7);
//! scheduler.add(TaskHandle::from(task.clone()));
//! assert_eq!(task.wait_for_result(), Ok(42));
//!
//! parallel_for(&scheduler, "touch_all", 0, 1_000, |i: usize| {
//!     let _ = i;
//! });
//!
//! scheduler.stop();
//! ```

pub mod parallel;
pub mod scheduling;
pub mod sync;
pub mod threads;
pub mod toolkit;

pub use parallel::*;
pub use scheduling::*;
pub use sync::*;
pub use threads::*;
