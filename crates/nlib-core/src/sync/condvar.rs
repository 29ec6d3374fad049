// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Condition variable bound to a [`Mutex`] (§4.1).

use std::time::Duration;

use super::mutex::MutexGuard;

/// Wraps `std::sync::Condvar`. `wait` takes the guard by value,
/// atomically releases the mutex, waits, and returns a new guard after
/// reacquiring — the API makes "call this without holding the mutex"
/// impossible to express, which is how the spec's contract ("must be
/// called with the bound mutex already held") is enforced here.
#[derive(Default)]
pub struct CondVar {
    inner: std::sync::Condvar,
}

/// Outcome of a timed wait: whether the timeout elapsed before a
/// notify was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResult {
    pub timed_out: bool,
}

impl CondVar {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Condvar::new(),
        }
    }

    /// Wait until notified. Spurious wakeups are possible; callers
    /// must re-check their predicate (use [`CondVar::wait_while`] to
    /// have that handled automatically).
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let std_guard = guard.into_inner();
        let std_guard = self.inner.wait(std_guard).unwrap_or_else(|p| p.into_inner());
        MutexGuard::from_inner(std_guard)
    }

    /// Wait until `predicate` holds, re-checking after every wakeup.
    pub fn wait_while<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        mut predicate: impl FnMut(&mut T) -> bool,
    ) -> MutexGuard<'a, T> {
        let std_guard = guard.into_inner();
        let std_guard = self
            .inner
            .wait_while(std_guard, |v| predicate(v))
            .unwrap_or_else(|p| p.into_inner());
        MutexGuard::from_inner(std_guard)
    }

    /// Wait up to `timeout`, returning whether it elapsed.
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        let std_guard = guard.into_inner();
        let (std_guard, result) = self
            .inner
            .wait_timeout(std_guard, timeout)
            .unwrap_or_else(|p| p.into_inner());
        (
            MutexGuard::from_inner(std_guard),
            WaitTimeoutResult {
                timed_out: result.timed_out(),
            },
        )
    }

    /// Wake exactly one waiter.
    pub fn notify_one(&self) {
        self.inner.notify_one();
    }

    /// Wake every waiter.
    pub fn notify_all(&self) {
        self.inner.notify_all();
    }
}
