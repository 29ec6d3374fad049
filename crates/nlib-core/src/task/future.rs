// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Future/Promise pair with continuations (§4.3).
//!
//! Not `std::future::Future` — this is the classic thread-pool
//! "promise fulfilled from a worker, future observed from anywhere"
//! shape, grounded in the teacher's channel/cancel primitives but with
//! a terminal-state latch instead of a one-shot mpsc so any number of
//! readers and continuations can observe the same outcome.

use std::sync::Arc;
use std::time::Duration;

use crate::error::TaskError;
use crate::sync::{CondVar, Mutex};

/// Terminal outcome of a future. `Completed` wraps the value in an
/// `Arc` so it can be shared with every continuation and every clone
/// of the future without requiring `T: Clone`.
pub enum Outcome<T> {
    Completed(Arc<T>),
    Cancelled,
    Faulted(TaskError),
}

impl<T> Clone for Outcome<T> {
    fn clone(&self) -> Self {
        match self {
            Outcome::Completed(v) => Outcome::Completed(v.clone()),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::Faulted(e) => Outcome::Faulted(e.clone()),
        }
    }
}

type Continuation<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

enum Slot<T> {
    Pending,
    Done(Outcome<T>),
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    cond: CondVar,
    continuations: Mutex<Vec<Continuation<T>>>,
}

impl<T> Inner<T> {
    fn resolve(self: &Arc<Self>, outcome: Outcome<T>) {
        {
            let mut slot = self.slot.lock();
            if !matches!(&*slot, Slot::Pending) {
                return; // already resolved; fulfilling twice is a no-op
            }
            *slot = Slot::Done(outcome.clone());
        }
        self.cond.notify_all();
        let continuations = std::mem::take(&mut *self.continuations.lock());
        for continuation in continuations {
            continuation(&outcome);
        }
    }
}

/// The unique write-end. Dropping a promise without resolving it
/// transitions the paired future to `Cancelled`.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
    fulfilled: bool,
}

/// A read-end observed from any thread; cheaply cloneable.
pub struct Future<T> {
    inner: Arc<Inner<T>>,
}

/// Create a linked promise/future pair.
pub fn channel<T>() -> (Promise<T>, Future<T>) {
    let inner = Arc::new(Inner {
        slot: Mutex::new(Slot::Pending),
        cond: CondVar::new(),
        continuations: Mutex::new(Vec::new()),
    });
    (
        Promise {
            inner: inner.clone(),
            fulfilled: false,
        },
        Future { inner },
    )
}

impl<T> Promise<T> {
    pub fn set(mut self, value: T) {
        self.fulfilled = true;
        self.inner.resolve(Outcome::Completed(Arc::new(value)));
    }

    pub fn set_cancelled(mut self) {
        self.fulfilled = true;
        self.inner.resolve(Outcome::Cancelled);
    }

    pub fn set_faulted(mut self, error: TaskError) {
        self.fulfilled = true;
        self.inner.resolve(Outcome::Faulted(error));
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.fulfilled {
            self.inner.resolve(Outcome::Cancelled);
        }
    }
}

impl<T: Send + Sync + 'static> Future<T> {
    /// Block until terminal.
    pub fn wait(&self) {
        let slot = self.inner.slot.lock();
        let _ = self.inner.cond.wait_while(slot, |s| matches!(s, Slot::Pending));
    }

    /// Block up to `timeout`. Returns whether a terminal state was
    /// reached within the window.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut slot = self.inner.slot.lock();
        loop {
            if !matches!(&*slot, Slot::Pending) {
                return true;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (s, result) = self.inner.cond.wait_timeout(slot, deadline - now);
            slot = s;
            if result.timed_out && matches!(&*slot, Slot::Pending) {
                return false;
            }
        }
    }

    /// Read the outcome without blocking, if already terminal.
    pub fn peek(&self) -> Option<Outcome<T>> {
        match &*self.inner.slot.lock() {
            Slot::Pending => None,
            Slot::Done(outcome) => Some(outcome.clone()),
        }
    }

    /// Block until terminal and return the outcome.
    pub fn result(&self) -> Outcome<T> {
        self.wait();
        self.peek().expect("terminal after wait()")
    }

    /// Attach a continuation. Runs inline on the calling thread if the
    /// future is already terminal; otherwise runs on whichever thread
    /// performs the terminal transition, in registration order.
    pub fn on_complete(&self, continuation: impl FnOnce(&Outcome<T>) + Send + 'static) {
        let mut slot = self.inner.slot.lock();
        match &*slot {
            Slot::Done(outcome) => {
                let outcome = outcome.clone();
                drop(slot);
                continuation(&outcome);
            }
            Slot::Pending => {
                self.inner.continuations.lock().push(Box::new(continuation));
                drop(slot);
            }
        }
    }

    /// Derive a new future whose value is `f`'s result. If this future
    /// is Faulted or Cancelled, the derived future inherits that
    /// outcome and `f` is never called.
    pub fn then<U, F>(&self, f: F) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        let (promise, future) = channel::<U>();
        self.on_complete(move |outcome| match outcome {
            Outcome::Completed(value) => promise.set(f(&**value)),
            Outcome::Cancelled => promise.set_cancelled(),
            Outcome::Faulted(error) => promise.set_faulted(error.clone()),
        });
        future
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
