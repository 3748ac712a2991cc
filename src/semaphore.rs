//! A counting semaphore built on a mutex-guarded counter and a condvar.
//!
//! POSIX `sem_t` (`sem_wait`/`sem_post`) is itself just this, underneath —
//! a guarded integer with a wait queue — so building one this way is the
//! direct Rust analogue of the original proxy's `idle_sem`/`req_sem`
//! rather than a reach for a fancier primitive. `parking_lot` supplies the
//! `Mutex`/`Condvar` (the same crate the teacher's sibling in this
//! retrieval pack, `epheo-kiss`, depends on for its locking).

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    /// `sem_post` — increments the count and wakes one waiter.
    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cond.notify_one();
    }

    /// `sem_wait` — blocks until the count is positive, then decrements it.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    /// `sem_trywait` with a bound, used only by tests that need to assert
    /// "no post happened" without blocking forever.
    #[cfg(test)]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            let result = self.cond.wait_for(&mut count, timeout);
            if result.timed_out() && *count == 0 {
                return false;
            }
        }
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub fn value(&self) -> usize {
        *self.count.lock()
    }
}
