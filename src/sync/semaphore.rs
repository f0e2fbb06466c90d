// Counting semaphore with an optional maximum count. The maximum mirrors
// the platform semaphores the contract was lifted from: notifications past
// it are clamped, and notify_all raises the count straight to it.

use std::sync::{Arc, Condvar, LazyLock, Mutex};
use std::time::Duration;

use super::{
    NamedRegistry, SyncError, SyncObjectCreationMode, WaitAny, WaitAnyWatchers,
};

static NAMED_SEMAPHORES: LazyLock<NamedRegistry<SemaphoreInner>> =
    LazyLock::new(NamedRegistry::new);

struct SemaphoreInner {
    count: Mutex<usize>,
    max_count: usize,
    cond: Condvar,
    watchers: WaitAnyWatchers,
}

impl SemaphoreInner {
    fn new(init_count: usize, max_count: usize) -> Arc<Self> {
        assert!(
            init_count <= max_count,
            "semaphore initial count {init_count} exceeds maximum {max_count}"
        );
        Arc::new(Self {
            count: Mutex::new(init_count),
            max_count,
            cond: Condvar::new(),
            watchers: WaitAnyWatchers::new(),
        })
    }
}

#[derive(Clone)]
pub struct CountingSemaphore {
    inner: Arc<SemaphoreInner>,
}

impl CountingSemaphore {
    /// Creates an unnamed semaphore with `init_count` credits and no
    /// practical maximum.
    pub fn new(init_count: usize) -> Self {
        Self {
            inner: SemaphoreInner::new(init_count, usize::MAX),
        }
    }

    /// Creates an unnamed semaphore whose count never exceeds `max_count`.
    pub fn with_max(init_count: usize, max_count: usize) -> Self {
        Self {
            inner: SemaphoreInner::new(init_count, max_count),
        }
    }

    /// Creates or opens a named semaphore. `init_count`/`max_count` only
    /// apply when the call ends up creating the object.
    pub fn named(
        name: &str,
        mode: SyncObjectCreationMode,
        init_count: usize,
        max_count: usize,
    ) -> Result<Self, SyncError> {
        let inner =
            NAMED_SEMAPHORES.resolve(name, mode, || SemaphoreInner::new(init_count, max_count))?;
        Ok(Self { inner })
    }

    /// Adds up to `credits` to the count, clamped at the maximum. Returns
    /// how many credits were actually added.
    pub fn notify(&self, credits: usize) -> usize {
        let mut count = self.inner.count.lock().unwrap();
        let added = credits.min(self.inner.max_count - *count);
        *count += added;
        drop(count);

        match added {
            0 => {}
            1 => self.inner.cond.notify_one(),
            _ => self.inner.cond.notify_all(),
        }
        if added > 0 {
            self.inner.watchers.poke();
        }
        added
    }

    /// Adds a single credit. Returns whether the count had room for it.
    pub fn notify_one(&self) -> bool {
        self.notify(1) == 1
    }

    /// Raises the count to the maximum, releasing every blocked waiter.
    pub fn notify_all(&self) {
        let mut count = self.inner.count.lock().unwrap();
        *count = self.inner.max_count;
        drop(count);
        self.inner.cond.notify_all();
        self.inner.watchers.poke();
    }

    /// Blocks until a credit is available, then takes it.
    pub fn wait(&self) {
        let mut count = self.inner.count.lock().unwrap();
        while *count == 0 {
            count = self.inner.cond.wait(count).unwrap();
        }
        *count -= 1;
    }

    /// Takes a credit without blocking. Returns whether one was available.
    pub fn try_wait(&self) -> bool {
        let mut count = self.inner.count.lock().unwrap();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Waits for a credit with a timeout. Returns `true` iff one was taken
    /// within the window.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut count = self.inner.count.lock().unwrap();
        while *count == 0 {
            let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now())
            else {
                return false;
            };
            let (guard, result) = self.inner.cond.wait_timeout(count, remaining).unwrap();
            count = guard;
            if result.timed_out() && *count == 0 {
                return false;
            }
        }
        *count -= 1;
        true
    }

    pub fn count(&self) -> usize {
        *self.inner.count.lock().unwrap()
    }

    pub fn max_count(&self) -> usize {
        self.inner.max_count
    }
}

impl WaitAny for CountingSemaphore {
    fn try_acquire(&self) -> bool {
        self.try_wait()
    }

    fn wait_any_watchers(&self) -> &WaitAnyWatchers {
        &self.inner.watchers
    }
}
