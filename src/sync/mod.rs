//! Synchronization primitives used by the scheduling core: manual and auto
//! reset events, a counting semaphore, a timed mutex, and a wait-for-any
//! operation over signalable objects.
//!
//! Every primitive exists in two tiers: unnamed (process-local, anonymous)
//! and named. Named objects are shared through a process-wide registry and
//! follow the [`SyncObjectCreationMode`] contract.

mod events;
mod mutex;
mod registry;
mod semaphore;
mod wait;

pub use events::*;
pub use mutex::*;
pub(crate) use registry::NamedRegistry;
pub use semaphore::*;
pub use wait::*;

use thiserror::Error;

/// How a named synchronization object should be created or opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncObjectCreationMode {
    /// Create the object; fail if one with the same name is already alive.
    CreateIfNonexistent,
    /// Open an existing object; fail if none with this name is alive.
    OpenExisting,
    /// Open the object if it exists, create it otherwise.
    OpenOrCreate,
}

/// Errors reported when constructing named synchronization objects.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid sync object name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("a sync object named {0:?} already exists")]
    AlreadyExists(String),

    #[error("no sync object named {0:?} exists")]
    NotFound(String),
}
