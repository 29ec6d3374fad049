// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Manual- and auto-reset event (§4.1).

use std::time::{Duration, Instant};

use super::condvar::CondVar;
use super::mutex::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResetMode {
    /// `Wait` clears the signal for every waiter after waking it.
    AutoReset,
    /// `Wait` leaves the signal set; callers must `Reset` explicitly.
    ManualReset,
}

pub struct Event {
    state: Mutex<bool>,
    cond: CondVar,
    mode: EventResetMode,
}

impl Event {
    pub fn new(mode: EventResetMode) -> Self {
        Self {
            state: Mutex::new(false),
            cond: CondVar::new(),
            mode,
        }
    }

    /// Signal the event, waking waiters per the reset mode.
    pub fn set(&self) {
        let mut guard = self.state.lock();
        *guard = true;
        drop(guard);
        match self.mode {
            EventResetMode::AutoReset => self.cond.notify_one(),
            EventResetMode::ManualReset => self.cond.notify_all(),
        }
    }

    /// Clear the signal.
    pub fn reset(&self) {
        *self.state.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock()
    }

    /// Block until signalled.
    pub fn wait(&self) {
        let guard = self.state.lock();
        let mut guard = self.cond.wait_while(guard, |signalled| !*signalled);
        if self.mode == EventResetMode::AutoReset {
            *guard = false;
        }
    }

    /// Block up to `timeout`. Returns whether the event was observed
    /// signalled within the window.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock();
        loop {
            if *guard {
                if self.mode == EventResetMode::AutoReset {
                    *guard = false;
                }
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (g, result) = self.cond.wait_timeout(guard, deadline - now);
            guard = g;
            if result.timed_out && !*guard {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn manual_reset_stays_signalled() {
        let e = Event::new(EventResetMode::ManualReset);
        e.set();
        e.wait();
        assert!(e.is_set());
        e.wait(); // still signalled, returns immediately
    }

    #[test]
    fn auto_reset_clears_after_wait() {
        let e = Event::new(EventResetMode::AutoReset);
        e.set();
        e.wait();
        assert!(!e.is_set());
    }

    #[test]
    fn wait_for_times_out_when_unset() {
        let e = Event::new(EventResetMode::ManualReset);
        assert!(!e.wait_for(Duration::from_millis(10)));
    }

    #[test]
    fn cross_thread_signal() {
        let e = Arc::new(Event::new(EventResetMode::ManualReset));
        let e2 = e.clone();
        let handle = thread::spawn(move || {
            e2.wait();
        });
        thread::sleep(Duration::from_millis(10));
        e.set();
        handle.join().unwrap();
    }

    #[test]
    fn auto_reset_wakes_single_waiter_at_a_time() {
        let e = Arc::new(Event::new(EventResetMode::AutoReset));
        let woken = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let e = e.clone();
                let woken = woken.clone();
                thread::spawn(move || {
                    e.wait();
                    woken.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(10));
        e.set();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(woken.load(std::sync::atomic::Ordering::SeqCst), 1);

        e.set();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(woken.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
