// A timed mutex built on a condvar-guarded flag. Ownership is conveyed
// through guards, so releasing twice is unrepresentable; the condvar gives
// us the timed acquisition std's mutex lacks.

use std::sync::{Arc, Condvar, LazyLock, Mutex};
use std::time::Duration;

use super::{NamedRegistry, SyncError, SyncObjectCreationMode};

static NAMED_MUTEXES: LazyLock<NamedRegistry<MutexInner>> = LazyLock::new(NamedRegistry::new);

struct MutexInner {
    locked: Mutex<bool>,
    cond: Condvar,
}

impl MutexInner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            locked: Mutex::new(false),
            cond: Condvar::new(),
        })
    }
}

#[derive(Clone)]
pub struct SyncMutex {
    inner: Arc<MutexInner>,
}

/// Owned lock guard. The mutex is released when the guard drops.
pub struct SyncMutexGuard {
    inner: Arc<MutexInner>,
}

impl Drop for SyncMutexGuard {
    fn drop(&mut self) {
        let mut locked = self.inner.locked.lock().unwrap();
        *locked = false;
        drop(locked);
        self.inner.cond.notify_one();
    }
}

impl SyncMutex {
    pub fn new() -> Self {
        Self {
            inner: MutexInner::new(),
        }
    }

    /// Creates the mutex already held, returning the guard alongside it.
    pub fn new_locked() -> (Self, SyncMutexGuard) {
        let mutex = Self::new();
        let guard = mutex.lock();
        (mutex, guard)
    }

    pub fn named(name: &str, mode: SyncObjectCreationMode) -> Result<Self, SyncError> {
        let inner = NAMED_MUTEXES.resolve(name, mode, MutexInner::new)?;
        Ok(Self { inner })
    }

    pub fn lock(&self) -> SyncMutexGuard {
        let mut locked = self.inner.locked.lock().unwrap();
        while *locked {
            locked = self.inner.cond.wait(locked).unwrap();
        }
        *locked = true;
        drop(locked);
        SyncMutexGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn try_lock(&self) -> Option<SyncMutexGuard> {
        let mut locked = self.inner.locked.lock().unwrap();
        if *locked {
            return None;
        }
        *locked = true;
        drop(locked);
        Some(SyncMutexGuard {
            inner: self.inner.clone(),
        })
    }

    /// Attempts the lock for up to `timeout`. `None` means the window
    /// elapsed with the mutex still held elsewhere.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<SyncMutexGuard> {
        let deadline = std::time::Instant::now() + timeout;
        let mut locked = self.inner.locked.lock().unwrap();
        while *locked {
            let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
            let (guard, result) = self.inner.cond.wait_timeout(locked, remaining).unwrap();
            locked = guard;
            if result.timed_out() && *locked {
                return None;
            }
        }
        *locked = true;
        drop(locked);
        Some(SyncMutexGuard {
            inner: self.inner.clone(),
        })
    }
}

impl Default for SyncMutex {
    fn default() -> Self {
        Self::new()
    }
}
