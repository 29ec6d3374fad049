// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cooperative cancellation token (§4.3).
//!
//! Grounded in the teacher's `CancelToken` (`AtomicBool` flag, checked
//! cooperatively by the task body), extended with idempotent
//! subscriber callbacks fired exactly once on the transition to
//! cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crate::sync::Mutex;

type Subscriber = Box<dyn FnOnce() + Send>;

/// Shared between the owner that may call `cancel()` and every task
/// body that polls `is_cancelled()`.
pub struct CancellationToken {
    flag: AtomicBool,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// A distinguished token that is never cancelled, for tasks that
    /// do not need cancellation support. Cloning is not meaningful for
    /// a token (there is no `Clone` impl); callers share the `'static`
    /// reference instead.
    pub fn none() -> &'static CancellationToken {
        static NONE: OnceLock<CancellationToken> = OnceLock::new();
        NONE.get_or_init(CancellationToken::new)
    }

    /// Request cancellation. Idempotent: subscribers fire exactly once,
    /// on the first call.
    pub fn cancel(&self) {
        if self.flag.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscribers = std::mem::take(&mut *self.subscribers.lock());
        for subscriber in subscribers {
            if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(subscriber)) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!(error = %message, "cancellation subscriber panicked, swallowed");
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Register a callback to run when cancellation happens. If the
    /// token is already cancelled, it runs immediately on the calling
    /// thread instead of being queued.
    pub fn subscribe(&self, callback: impl FnOnce() + Send + 'static) {
        if self.is_cancelled() {
            callback();
            return;
        }
        let mut subscribers = self.subscribers.lock();
        // Re-check under the lock: `cancel()` may have run and drained
        // the list between the fast-path check above and this lock.
        if self.is_cancelled() {
            drop(subscribers);
            callback();
        } else {
            subscribers.push(Box::new(callback));
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn cancel_is_idempotent() {
        let token = CancellationToken::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f2 = fired.clone();
        token.subscribe(move || {
            f2.fetch_add(1, Ordering::SeqCst);
        });
        token.cancel();
        token.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(token.is_cancelled());
    }

    #[test]
    fn subscribe_after_cancel_runs_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let fired = Arc::new(AtomicUsize::new(0));
        let f2 = fired.clone();
        token.subscribe(move || {
            f2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_subscriber_is_swallowed() {
        let token = CancellationToken::new();
        token.subscribe(|| panic!("boom"));
        token.cancel(); // must not propagate the panic
        assert!(token.is_cancelled());
    }

    #[test]
    fn none_token_is_never_cancelled() {
        assert!(!CancellationToken::none().is_cancelled());
    }
}

/// Model-checks the idempotent-swap guard in [`CancellationToken::cancel`]
/// in isolation under every thread interleaving loom explores. Reproduces
/// just the `swap(true, ..)` admission check rather than driving the full
/// `CancellationToken`, since `cancel` also takes a `crate::sync::Mutex`
/// for its subscriber list, which loom cannot instrument.
#[cfg(all(test, feature = "loom-model"))]
mod loom_tests {
    use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn cancel_swap_fires_exactly_once() {
        loom::model(|| {
            let flag = Arc::new(AtomicBool::new(false));
            let fired = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let flag = flag.clone();
                    let fired = fired.clone();
                    thread::spawn(move || {
                        if !flag.swap(true, Ordering::AcqRel) {
                            fired.fetch_add(1, Ordering::AcqRel);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(fired.load(Ordering::Acquire), 1);
            assert!(flag.load(Ordering::Acquire));
        });
    }
}
