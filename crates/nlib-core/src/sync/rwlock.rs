// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Read/write lock with writer preference (§4.1).
//!
//! `std::sync::RwLock`'s writer-starvation behavior is platform
//! dependent (glibc's `pthread_rwlock` does not prefer writers, for
//! instance), so this is hand-rolled on `Mutex` + `CondVar` with an
//! explicit `waiting_writers` counter: once a writer is queued, new
//! readers block behind it instead of continuously renewing the
//! read-side and starving the writer out.

use std::ops::{Deref, DerefMut};

use super::condvar::CondVar;
use super::mutex::Mutex;

struct State {
    readers: u32,
    writer: bool,
    waiting_writers: u32,
}

pub struct RwLock<T> {
    state: Mutex<State>,
    cond: CondVar,
    data: std::cell::UnsafeCell<T>,
}

unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(State {
                readers: 0,
                writer: false,
                waiting_writers: 0,
            }),
            cond: CondVar::new(),
            data: std::cell::UnsafeCell::new(value),
        }
    }

    /// Acquire shared access. Blocks while a writer holds or is
    /// waiting for the lock (writer preference).
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let guard = self.state.lock();
        let mut guard =
            self.cond
                .wait_while(guard, |s| s.writer || s.waiting_writers > 0);
        guard.readers += 1;
        drop(guard);
        RwLockReadGuard { lock: self }
    }

    /// Acquire exclusive access. Blocks until all readers and any
    /// other writer release.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let mut guard = self.state.lock();
        guard.waiting_writers += 1;
        let mut guard = self.cond.wait_while(guard, |s| s.writer || s.readers > 0);
        guard.writer = true;
        guard.waiting_writers -= 1;
        drop(guard);
        RwLockWriteGuard { lock: self }
    }

    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        let mut guard = self.state.try_lock()?;
        if guard.writer || guard.waiting_writers > 0 {
            return None;
        }
        guard.readers += 1;
        Some(RwLockReadGuard { lock: self })
    }

    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        let mut guard = self.state.try_lock()?;
        if guard.writer || guard.readers > 0 {
            return None;
        }
        guard.writer = true;
        Some(RwLockWriteGuard { lock: self })
    }
}

impl<'a, T> Deref for RwLockReadGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwLockReadGuard<'a, T> {
    fn drop(&mut self) {
        let mut guard = self.lock.state.lock();
        guard.readers -= 1;
        let wake_all = guard.readers == 0;
        drop(guard);
        if wake_all {
            self.lock.cond.notify_all();
        }
    }
}

impl<'a, T> Deref for RwLockWriteGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for RwLockWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwLockWriteGuard<'a, T> {
    fn drop(&mut self) {
        let mut guard = self.lock.state.lock();
        guard.writer = false;
        drop(guard);
        self.lock.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn concurrent_readers() {
        let lock = Arc::new(RwLock::new(42));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    let guard = lock.read();
                    assert_eq!(*guard, 42);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn exclusive_write() {
        let lock = RwLock::new(0);
        *lock.write() = 10;
        assert_eq!(*lock.read(), 10);
    }

    #[test]
    fn writer_not_starved_by_continuous_readers() {
        // Continuous stream of short readers; a writer queued midway
        // must get in within a bounded number of reader cycles rather
        // than waiting forever.
        let lock = Arc::new(RwLock::new(0u64));
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let reader_handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let _g = lock.read();
                        thread::sleep(Duration::from_micros(200));
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(5));
        let writer_done = Arc::new(AtomicUsize::new(0));
        {
            let lock = lock.clone();
            let writer_done = writer_done.clone();
            let h = thread::spawn(move || {
                *lock.write() = 99;
                writer_done.store(1, Ordering::Relaxed);
            });
            h.join().unwrap();
        }
        assert_eq!(writer_done.load(Ordering::Relaxed), 1);
        assert_eq!(*lock.read(), 99);

        stop.store(true, Ordering::Relaxed);
        for h in reader_handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn try_read_fails_while_writer_waiting() {
        let lock = Arc::new(RwLock::new(0));
        let _reader = lock.read();
        // No writer yet: try_read should still succeed (multiple readers ok).
        assert!(lock.try_read().is_some());
    }
}
