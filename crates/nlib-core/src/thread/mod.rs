// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! OS thread handle, current-thread helpers, hardware-concurrency hint
//! and thread-local storage (§4.2).
//!
//! Grounded in the teacher's `spawn.rs`: an affine handle wrapping a
//! real `std::thread::JoinHandle`, panics captured through
//! `catch_unwind` rather than propagated across the thread boundary.
//! Interruption here is advisory only — the target thread must poll
//! [`Thread::is_interrupted`] (or [`is_interrupted`] from inside its
//! own body) on its own schedule, matching `CancelToken`'s cooperative
//! design in the teacher crate.

mod tls;

pub use tls::ThreadLocalSlot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::sync::{Event, EventResetMode};

/// Best-effort scheduling priority. Platforms that cannot honor it
/// (most do not expose thread priority without elevated privileges)
/// silently ignore the hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Outcome of joining a thread that failed to run to completion.
#[derive(Debug)]
pub enum JoinError {
    /// The body panicked; the message is recovered where possible.
    Panicked(String),
    /// `try_join` was called before the thread finished.
    TimedOut,
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinError::Panicked(msg) => write!(f, "thread panicked: {msg}"),
            JoinError::TimedOut => write!(f, "thread did not finish within the timeout"),
        }
    }
}

impl std::error::Error for JoinError {}

struct Shared {
    interrupted: Arc<AtomicBool>,
    finished: Event,
}

/// An OS thread started through this module.
///
/// Name and priority are advisory and best-effort; `Interrupt` only
/// sets a flag the body is expected to poll via [`Thread::is_interrupted`].
pub struct Thread<T> {
    handle: Option<JoinHandle<Result<T, String>>>,
    shared: Arc<Shared>,
    name: String,
    priority: ThreadPriority,
    background: bool,
}

thread_local! {
    static CURRENT_INTERRUPT: std::cell::RefCell<Option<Arc<AtomicBool>>> =
        std::cell::RefCell::new(None);
}

impl<T: Send + 'static> Thread<T> {
    /// Start a new thread named `name`, running `body`. `body` receives
    /// nothing but may call [`is_interrupted`] to observe cooperative
    /// interruption requests.
    pub fn start<F>(name: impl Into<String>, priority: ThreadPriority, body: F) -> Thread<T>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let name = name.into();
        let shared = Arc::new(Shared {
            interrupted: Arc::new(AtomicBool::new(false)),
            finished: Event::new(EventResetMode::ManualReset),
        });
        let shared_for_body = shared.clone();

        let builder = std::thread::Builder::new().name(name.clone());
        let handle = builder
            .spawn(move || {
                let flag = shared_for_body.interrupted.clone();
                CURRENT_INTERRUPT.with(|cell| *cell.borrow_mut() = Some(flag));

                let result =
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(body)) {
                        Ok(value) => Ok(value),
                        Err(payload) => Err(panic_message(payload)),
                    };
                shared_for_body.finished.set();
                result
            })
            .expect("failed to spawn OS thread");

        Thread {
            handle: Some(handle),
            shared,
            name,
            priority,
            background: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> ThreadPriority {
        self.priority
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn mark_background(&mut self) {
        self.background = true;
    }

    /// Request cooperative interruption. Advisory only.
    pub fn interrupt(&self) {
        self.shared.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.shared.interrupted.load(Ordering::Relaxed)
    }

    /// Block until the thread finishes, returning its result.
    pub fn join(mut self) -> Result<T, JoinError> {
        let handle = self.handle.take().expect("thread already joined");
        match handle.join() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(msg)) => Err(JoinError::Panicked(msg)),
            Err(payload) => Err(JoinError::Panicked(panic_message(payload))),
        }
    }

    /// Block up to `timeout` for the thread to finish. On timeout the
    /// thread keeps running and `self` is returned so the caller can
    /// retry or eventually call [`Thread::join`].
    pub fn try_join(mut self, timeout: Duration) -> Result<Result<T, JoinError>, Thread<T>> {
        if self.shared.finished.wait_for(timeout) {
            Ok(self.join())
        } else {
            Err(self)
        }
    }

    /// Fire-and-forget: let the thread keep running independently.
    pub fn detach(mut self) {
        drop(self.handle.take());
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Whether the calling thread has been asked to interrupt, if it was
/// started through [`Thread::start`]. Threads not started this way
/// (e.g. the process main thread) always observe `false`.
pub fn is_interrupted() -> bool {
    CURRENT_INTERRUPT.with(|cell| {
        cell.borrow()
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    })
}

/// Current OS thread id, suitable for logging and diagnostics.
pub fn current_id() -> std::thread::ThreadId {
    std::thread::current().id()
}

/// Suspend the calling thread for `duration`.
pub fn sleep(duration: Duration) {
    std::thread::sleep(duration);
}

/// Yield the remainder of the calling thread's timeslice.
pub fn yield_now() {
    std::thread::yield_now();
}

/// Number of logical CPUs available to this process, falling back to
/// `1` if the platform cannot report it.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_join_returns_value() {
        let t = Thread::start("worker", ThreadPriority::Normal, || 42);
        assert_eq!(t.join().unwrap(), 42);
    }

    #[test]
    fn panic_is_captured_on_join() {
        let t = Thread::<i32>::start("worker", ThreadPriority::Normal, || panic!("boom"));
        match t.join() {
            Err(JoinError::Panicked(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }

    #[test]
    fn try_join_times_out_then_succeeds() {
        let t = Thread::start("worker", ThreadPriority::Normal, || {
            std::thread::sleep(Duration::from_millis(30));
            7
        });
        let t = match t.try_join(Duration::from_millis(1)) {
            Err(t) => t,
            Ok(_) => panic!("expected timeout"),
        };
        std::thread::sleep(Duration::from_millis(60));
        match t.try_join(Duration::from_millis(0)) {
            Ok(Ok(value)) => assert_eq!(value, 7),
            other => panic!("expected Ok(Ok(7)), got {other:?}"),
        }
    }

    #[test]
    fn interrupt_is_advisory_and_polled() {
        let t = Thread::start("worker", ThreadPriority::Normal, || {
            while !is_interrupted() {
                std::thread::sleep(Duration::from_millis(2));
            }
            "stopped"
        });
        std::thread::sleep(Duration::from_millis(10));
        t.interrupt();
        assert_eq!(t.join().unwrap(), "stopped");
    }

    #[test]
    fn detach_lets_thread_run_independently() {
        let t = Thread::start("worker", ThreadPriority::Normal, || {
            std::thread::sleep(Duration::from_millis(5));
        });
        t.detach();
    }

    #[test]
    fn hardware_concurrency_is_at_least_one() {
        assert!(hardware_concurrency() >= 1);
    }
}
