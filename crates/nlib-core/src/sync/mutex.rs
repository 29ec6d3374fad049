// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Non-recursive mutex (§4.1 MX1-MX2).

use std::ops::{Deref, DerefMut};
use std::sync::{self, TryLockError};

/// Exclusive-access wrapper over `std::sync::Mutex`.
///
/// Double-locking by the same thread is a contract violation (§4.1):
/// the underlying `std::sync::Mutex` turns that into a deadlock of the
/// offending thread rather than corrupting state, which is the
/// closest safe analogue to "undefined behavior" this crate can offer
/// without hand-rolling a non-reentrant futex.
pub struct Mutex<T> {
    inner: sync::Mutex<T>,
}

/// RAII guard. Releases the lock on drop, including on an unwinding
/// panic, so every exit path releases exactly once.
pub struct MutexGuard<'a, T> {
    guard: sync::MutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: sync::Mutex::new(value),
        }
    }

    /// Acquire the lock, blocking the calling thread.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        match self.inner.lock() {
            Ok(guard) => MutexGuard { guard },
            Err(poisoned) => MutexGuard {
                guard: poisoned.into_inner(),
            },
        }
    }

    /// Attempt to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(MutexGuard { guard }),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poisoned)) => Some(MutexGuard {
                guard: poisoned.into_inner(),
            }),
        }
    }

}

impl<'a, T> MutexGuard<'a, T> {
    /// Explicitly release the lock. Equivalent to dropping the guard;
    /// provided for parity with the spec's explicit `Unlock` operation.
    pub fn unlock(self) {
        drop(self);
    }

    /// Unwrap to the underlying `std::sync::MutexGuard`, for
    /// [`crate::sync::CondVar`] to hand to `std::sync::Condvar`.
    pub(crate) fn into_inner(self) -> sync::MutexGuard<'a, T> {
        self.guard
    }

    pub(crate) fn from_inner(guard: sync::MutexGuard<'a, T>) -> Self {
        Self { guard }
    }
}

impl<'a, T> Deref for MutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<'a, T> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_and_mutate() {
        let m = Mutex::new(0);
        *m.lock() += 1;
        assert_eq!(*m.lock(), 1);
    }

    #[test]
    fn try_lock_succeeds_when_free() {
        let m = Mutex::new(42);
        assert_eq!(*m.try_lock().unwrap(), 42);
    }

    #[test]
    fn try_lock_fails_when_held() {
        let m = Mutex::new(0);
        let _g = m.lock();
        assert!(m.try_lock().is_none());
    }

    #[test]
    fn concurrent_increments() {
        let m = Arc::new(Mutex::new(0));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *m.lock() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*m.lock(), 10_000);
    }

    #[test]
    fn unlock_releases_immediately() {
        let m = Mutex::new(0);
        let g = m.lock();
        g.unlock();
        assert!(m.try_lock().is_some());
    }
}
