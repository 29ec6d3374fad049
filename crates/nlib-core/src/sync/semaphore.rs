// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Counting semaphore (§4.1).

use std::time::{Duration, Instant};

use super::condvar::CondVar;
use super::mutex::Mutex;
use crate::error::SyncError;

struct State {
    count: usize,
}

/// Bounded counting semaphore. `Release` past the configured maximum
/// is rejected rather than silently clamped or allowed to overflow the
/// invariant the maximum exists to express.
pub struct Semaphore {
    state: Mutex<State>,
    cond: CondVar,
    max: usize,
}

impl Semaphore {
    pub fn new(initial: usize, max: usize) -> Self {
        debug_assert!(initial <= max, "initial count must not exceed max");
        Self {
            state: Mutex::new(State { count: initial }),
            cond: CondVar::new(),
            max,
        }
    }

    pub fn max_count(&self) -> usize {
        self.max
    }

    pub fn current_count(&self) -> usize {
        self.state.lock().count
    }

    /// Block until a permit is available, then take it.
    pub fn wait(&self) {
        let guard = self.state.lock();
        let mut guard = self.cond.wait_while(guard, |s| s.count == 0);
        guard.count -= 1;
    }

    /// Block up to `timeout` for a permit. Returns whether one was
    /// acquired.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock();
        loop {
            if guard.count > 0 {
                guard.count -= 1;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (g, result) = self.cond.wait_timeout(guard, deadline - now);
            guard = g;
            if result.timed_out && guard.count == 0 {
                return false;
            }
        }
    }

    /// Attempt to take a permit without blocking.
    pub fn try_wait(&self) -> bool {
        let mut guard = self.state.lock();
        if guard.count > 0 {
            guard.count -= 1;
            true
        } else {
            false
        }
    }

    /// Return `n` permits. Rejected if it would push the count above
    /// the configured maximum.
    pub fn release(&self, n: usize) -> Result<(), SyncError> {
        let mut guard = self.state.lock();
        let new_count = guard.count + n;
        if new_count > self.max {
            return Err(SyncError::SemaphoreOverRelease(n, self.max));
        }
        guard.count = new_count;
        drop(guard);
        if n == 1 {
            self.cond.notify_one();
        } else {
            self.cond.notify_all();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_and_release_roundtrip() {
        let sem = Semaphore::new(1, 4);
        sem.wait();
        assert_eq!(sem.current_count(), 0);
        sem.release(1).unwrap();
        assert_eq!(sem.current_count(), 1);
    }

    #[test]
    fn over_release_rejected() {
        let sem = Semaphore::new(2, 2);
        assert!(sem.release(1).is_err());
        assert_eq!(sem.current_count(), 2);
    }

    #[test]
    fn try_wait_fails_when_empty() {
        let sem = Semaphore::new(0, 1);
        assert!(!sem.try_wait());
    }

    #[test]
    fn wait_for_times_out() {
        let sem = Semaphore::new(0, 1);
        assert!(!sem.wait_for(std::time::Duration::from_millis(10)));
    }

    #[test]
    fn blocks_until_released() {
        let sem = Arc::new(Semaphore::new(0, 1));
        let s2 = sem.clone();
        let handle = thread::spawn(move || {
            s2.wait();
        });
        thread::sleep(std::time::Duration::from_millis(10));
        sem.release(1).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn bounds_concurrent_access() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let sem = Arc::new(Semaphore::new(2, 2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sem = sem.clone();
                let in_flight = in_flight.clone();
                let max_observed = max_observed.clone();
                thread::spawn(move || {
                    sem.wait();
                    let n = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(n, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    sem.release(1).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }
}
