//! Data-parallel iteration over integer ranges and indexable containers,
//! layered on the scheduler.

mod for_loop;
mod partitioner;

pub use for_loop::*;
pub use partitioner::*;
