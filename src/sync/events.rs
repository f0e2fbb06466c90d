// Implements the manual and auto reset event primitives over a condvar
// paired with a boolean state, the same shape as the worker wake latch.

use std::sync::{Arc, Condvar, Mutex, LazyLock};
use std::time::Duration;

use super::{
    NamedRegistry, SyncError, SyncObjectCreationMode, WaitAny, WaitAnyWatchers,
};

static NAMED_MANUAL_EVENTS: LazyLock<NamedRegistry<EventInner>> =
    LazyLock::new(NamedRegistry::new);
static NAMED_AUTO_EVENTS: LazyLock<NamedRegistry<EventInner>> =
    LazyLock::new(NamedRegistry::new);

struct EventInner {
    signaled: Mutex<bool>,
    cond: Condvar,
    watchers: WaitAnyWatchers,
}

impl EventInner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
            watchers: WaitAnyWatchers::new(),
        })
    }

    fn set(&self) {
        let mut signaled = self.signaled.lock().unwrap();
        *signaled = true;
        drop(signaled);
        self.cond.notify_all();
        self.watchers.poke();
    }
}

/// An event that, once notified, stays signaled and releases every waiter
/// (past and future) until it is explicitly [`reset`](Self::reset).
#[derive(Clone)]
pub struct ManualResetEvent {
    inner: Arc<EventInner>,
}

impl ManualResetEvent {
    /// Creates an unnamed, process-local event in the unsignaled state.
    pub fn new() -> Self {
        Self {
            inner: EventInner::new(),
        }
    }

    /// Creates or opens a named event.
    pub fn named(name: &str, mode: SyncObjectCreationMode) -> Result<Self, SyncError> {
        let inner = NAMED_MANUAL_EVENTS.resolve(name, mode, EventInner::new)?;
        Ok(Self { inner })
    }

    /// Signals the event, unblocking all current and future waiters.
    pub fn notify(&self) {
        self.inner.set();
    }

    /// Returns the event to the unsignaled state.
    pub fn reset(&self) {
        *self.inner.signaled.lock().unwrap() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.inner.signaled.lock().unwrap()
    }

    /// Blocks until the event is signaled. Returns immediately if it
    /// already is.
    pub fn wait(&self) {
        let mut signaled = self.inner.signaled.lock().unwrap();
        while !*signaled {
            signaled = self.inner.cond.wait(signaled).unwrap();
        }
    }

    /// Waits for the event with a timeout. Returns `true` iff the event
    /// was observed signaled within the window.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut signaled = self.inner.signaled.lock().unwrap();
        while !*signaled {
            let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now())
            else {
                return false;
            };
            let (guard, result) = self
                .inner
                .cond
                .wait_timeout(signaled, remaining)
                .unwrap();
            signaled = guard;
            if result.timed_out() && !*signaled {
                return false;
            }
        }
        true
    }
}

impl Default for ManualResetEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitAny for ManualResetEvent {
    fn try_acquire(&self) -> bool {
        self.is_set()
    }

    fn wait_any_watchers(&self) -> &WaitAnyWatchers {
        &self.inner.watchers
    }
}

/// An event that releases exactly one waiter per notification and returns
/// to the unsignaled state as it does.
#[derive(Clone)]
pub struct AutoResetEvent {
    inner: Arc<EventInner>,
}

impl AutoResetEvent {
    pub fn new() -> Self {
        Self {
            inner: EventInner::new(),
        }
    }

    pub fn named(name: &str, mode: SyncObjectCreationMode) -> Result<Self, SyncError> {
        let inner = NAMED_AUTO_EVENTS.resolve(name, mode, EventInner::new)?;
        Ok(Self { inner })
    }

    /// Signals the event. One waiter is released; with no waiter pending
    /// the event stays armed for the next `wait`.
    pub fn notify(&self) {
        let mut signaled = self.inner.signaled.lock().unwrap();
        *signaled = true;
        drop(signaled);
        self.inner.cond.notify_one();
        self.inner.watchers.poke();
    }

    pub fn wait(&self) {
        let mut signaled = self.inner.signaled.lock().unwrap();
        while !*signaled {
            signaled = self.inner.cond.wait(signaled).unwrap();
        }
        *signaled = false;
    }

    /// Consumes the signal without blocking. Returns whether the event was
    /// signaled.
    pub fn try_wait(&self) -> bool {
        let mut signaled = self.inner.signaled.lock().unwrap();
        let was_signaled = *signaled;
        *signaled = false;
        was_signaled
    }

    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut signaled = self.inner.signaled.lock().unwrap();
        while !*signaled {
            let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now())
            else {
                return false;
            };
            let (guard, result) = self
                .inner
                .cond
                .wait_timeout(signaled, remaining)
                .unwrap();
            signaled = guard;
            if result.timed_out() && !*signaled {
                return false;
            }
        }
        *signaled = false;
        true
    }
}

impl Default for AutoResetEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitAny for AutoResetEvent {
    fn try_acquire(&self) -> bool {
        self.try_wait()
    }

    fn wait_any_watchers(&self) -> &WaitAnyWatchers {
        &self.inner.watchers
    }
}

#[cfg(test)]
mod test_manual_reset_event {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn stays_signaled_for_late_waiters() {
        let event = ManualResetEvent::new();
        event.notify();
        event.notify();

        // Both observe the signal, neither consumes it.
        event.wait();
        event.wait();
        assert!(event.is_set());
    }

    #[test]
    fn reset_unsignals() {
        let event = ManualResetEvent::new();
        event.notify();
        event.reset();
        assert!(!event.wait_for(Duration::ZERO));
    }

    #[test]
    fn releases_every_waiter() {
        let event = ManualResetEvent::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let event = event.clone();
                thread::spawn(move || event.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        event.notify();

        for handle in handles {
            handle.join().expect("should safely join");
        }
    }

    #[test]
    fn named_events_share_state() {
        let a = ManualResetEvent::named("/mre-shared", SyncObjectCreationMode::CreateIfNonexistent)
            .expect("fresh name");
        let b = ManualResetEvent::named("/mre-shared", SyncObjectCreationMode::OpenExisting)
            .expect("open existing");

        a.notify();
        assert!(b.is_set());
    }
}

#[cfg(test)]
mod test_auto_reset_event {
    use std::time::Duration;

    use super::*;

    #[test]
    fn notify_is_consumed_by_one_wait() {
        let event = AutoResetEvent::new();
        event.notify();
        assert!(event.try_wait());
        assert!(!event.try_wait());
    }

    #[test]
    fn wait_for_times_out_when_unsignaled() {
        let event = AutoResetEvent::new();
        assert!(!event.wait_for(Duration::from_millis(10)));
        event.notify();
        assert!(event.wait_for(Duration::from_millis(10)));
    }
}
