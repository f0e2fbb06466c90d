// Implements waiting on several signalable objects at once.
//
// Each participating primitive keeps a list of watcher tokens it pokes
// whenever it becomes signaled; `wait_indefinitely_for_any` registers one
// token with every object in the set and sleeps on it until one of the
// objects can actually be acquired.

use std::sync::{Arc, Condvar, Mutex, Weak};

/// A signalable object that can take part in [`wait_indefinitely_for_any`].
///
/// Implemented by events and semaphores. Mutexes are deliberately not part
/// of this contract: their ownership is conveyed through guards, which a
/// bare index return cannot express.
pub trait WaitAny {
    /// Non-blocking acquisition attempt. Consumes the signal for
    /// auto-reset events and semaphores; observes it for manual-reset
    /// events.
    fn try_acquire(&self) -> bool;

    #[doc(hidden)]
    fn wait_any_watchers(&self) -> &WaitAnyWatchers;
}

/// Shared wake-up state of one `wait_indefinitely_for_any` call.
pub(crate) struct WaitAnyToken {
    woken: Mutex<bool>,
    cond: Condvar,
}

impl WaitAnyToken {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            woken: Mutex::new(false),
            cond: Condvar::new(),
        })
    }

    pub(crate) fn wake(&self) {
        let mut woken = self.woken.lock().unwrap();
        *woken = true;
        self.cond.notify_all();
    }

    fn sleep(&self) {
        let mut woken = self.woken.lock().unwrap();
        while !*woken {
            woken = self.cond.wait(woken).unwrap();
        }
        *woken = false;
    }
}

/// Per-primitive list of registered waiters. Primitives call
/// [`WaitAnyWatchers::poke`] on every transition to a signaled state.
#[derive(Default)]
pub struct WaitAnyWatchers {
    tokens: Mutex<Vec<Weak<WaitAnyToken>>>,
}

impl WaitAnyWatchers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn register(&self, token: &Arc<WaitAnyToken>) {
        self.tokens.lock().unwrap().push(Arc::downgrade(token));
    }

    pub(crate) fn poke(&self) {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.retain(|weak| match weak.upgrade() {
            Some(token) => {
                token.wake();
                true
            }
            None => false,
        });
    }
}

/// Blocks until one of `objects` is signaled, acquires it, and returns its
/// 0-based index. Blocks forever if none ever signals.
pub fn wait_indefinitely_for_any(objects: &[&dyn WaitAny]) -> usize {
    assert!(
        !objects.is_empty(),
        "wait_indefinitely_for_any needs at least one object"
    );

    let token = WaitAnyToken::new();
    for object in objects {
        object.wait_any_watchers().register(&token);
    }

    loop {
        // Checked after registration so a signal raised in between cannot
        // be missed.
        for (index, object) in objects.iter().enumerate() {
            if object.try_acquire() {
                return index;
            }
        }
        token.sleep();
    }
}

#[cfg(test)]
mod test_wait_any {
    use std::thread;
    use std::time::Duration;

    use crate::sync::{AutoResetEvent, CountingSemaphore, ManualResetEvent};

    use super::*;

    #[test]
    fn returns_index_of_already_signaled_object() {
        let first = ManualResetEvent::new();
        let second = ManualResetEvent::new();
        second.notify();

        let index = wait_indefinitely_for_any(&[&first as &dyn WaitAny, &second]);
        assert_eq!(index, 1);
    }

    #[test]
    fn wakes_up_on_late_signal() {
        let event = AutoResetEvent::new();
        let semaphore = CountingSemaphore::new(0);

        let sem_clone = semaphore.clone();
        let signaler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            sem_clone.notify_one();
        });

        let index = wait_indefinitely_for_any(&[&event as &dyn WaitAny, &semaphore]);
        assert_eq!(index, 1);
        // The winning semaphore credit was consumed by the wait.
        assert!(!semaphore.try_wait());

        signaler.join().expect("should safely join");
    }
}
