use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Binary semaphore: a release with no waiter is remembered once
#[derive(Debug, Default)]
pub struct Semaphore {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_one();
    }

    pub fn acquire(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
        *signaled = false;
    }

    /// Returns false if the timeout elapsed without a release
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.cond.wait_until(&mut signaled, deadline).timed_out() && !*signaled {
                return false;
            }
        }
        *signaled = false;
        true
    }
}
