//! Thread attributes and the attributed spawn helper the worker pool is
//! built on.

mod attributes;

pub use attributes::*;

use std::io;
use std::str::FromStr;
use std::thread::{self, JoinHandle};

/// Number of worker threads a pool should default to: the
/// `OQPI_NUM_THREADS` environment variable when it holds a positive
/// number, otherwise the machine's available parallelism.
pub fn default_worker_count() -> usize {
    match std::env::var("OQPI_NUM_THREADS")
        .ok()
        .and_then(|value| usize::from_str(&value).ok())
        .filter(|count| *count > 0)
    {
        Some(count) => {
            tracing::debug!("worker count {count} taken from OQPI_NUM_THREADS");
            count
        }
        None => hardware_thread_count(),
    }
}

/// What the platform reports as available parallelism, with a floor of 1.
pub fn hardware_thread_count() -> usize {
    thread::available_parallelism()
        .map_or(1, std::num::NonZero::get)
}

/// Spawns a thread carrying the given attributes: the name and stack size
/// go through [`thread::Builder`], the affinity mask is applied from inside
/// the new thread before `f` runs.
///
/// The OS scheduling priority of the attributes is recorded for platform
/// integrations but not applied here.
pub fn spawn_attributed<F, T>(attributes: &ThreadAttributes, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut builder = thread::Builder::new().name(attributes.name.clone());
    if let Some(stack_size) = attributes.stack_size {
        builder = builder.stack_size(stack_size);
    }

    let affinity = attributes.core_affinity;
    let priority = attributes.priority;
    builder.spawn(move || {
        pin_to_affinity(affinity);
        tracing::trace!(
            "thread {:?} running with requested priority {:?}",
            thread::current().name(),
            priority
        );
        f()
    })
}

/// Pins the calling thread to the lowest core of `affinity` present on the
/// machine. A full mask means "anywhere" and is left untouched.
fn pin_to_affinity(affinity: CoreAffinity) {
    if affinity.is_all_cores() {
        return;
    }

    let Some(wanted) = affinity.first_core() else {
        tracing::debug!("empty core affinity mask, leaving thread unpinned");
        return;
    };

    match core_affinity::get_core_ids()
        .unwrap_or_default()
        .into_iter()
        .find(|core| core.id == wanted)
    {
        Some(core) => {
            if !core_affinity::set_for_current(core) {
                tracing::debug!("failed to pin thread to core {wanted}");
            }
        }
        None => tracing::debug!("core {wanted} not present, leaving thread unpinned"),
    }
}

#[cfg(test)]
mod test_default_worker_count {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn env_override_wins() {
        std::env::set_var("OQPI_NUM_THREADS", "3");
        assert_eq!(default_worker_count(), 3);
        std::env::remove_var("OQPI_NUM_THREADS");
    }

    #[test]
    #[serial]
    fn falls_back_to_the_hardware() {
        std::env::remove_var("OQPI_NUM_THREADS");
        assert_eq!(default_worker_count(), hardware_thread_count());
        assert!(hardware_thread_count() >= 1);
    }

    #[test]
    #[serial]
    fn garbage_env_values_are_ignored() {
        std::env::set_var("OQPI_NUM_THREADS", "zero");
        assert_eq!(default_worker_count(), hardware_thread_count());
        std::env::set_var("OQPI_NUM_THREADS", "0");
        assert_eq!(default_worker_count(), hardware_thread_count());
        std::env::remove_var("OQPI_NUM_THREADS");
    }
}

#[cfg(test)]
mod test_spawn_attributed {
    use super::*;

    #[test]
    fn applies_name_and_runs_payload() {
        let attributes = ThreadAttributes::named("attributed_worker");
        let handle = spawn_attributed(&attributes, || {
            thread::current().name().map(ToOwned::to_owned)
        })
        .expect("spawn should succeed");

        let name = handle.join().expect("should safely join");
        assert_eq!(name.as_deref(), Some("attributed_worker"));
    }

    #[test]
    fn pinned_spawn_still_runs() {
        let attributes = ThreadAttributes {
            core_affinity: CoreAffinity::core(0),
            ..ThreadAttributes::named("pinned_worker")
        };
        let handle =
            spawn_attributed(&attributes, || 7usize).expect("spawn should succeed");
        assert_eq!(handle.join().expect("should safely join"), 7);
    }
}
