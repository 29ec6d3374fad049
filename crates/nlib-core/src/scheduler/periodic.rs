// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Recurring callback re-executed on a fixed interval (§4.4).
//!
//! Resolved Open Question: the spec calls for stop latency bounded at
//! roughly the polling granularity. This waits on a condvar with a
//! 10ms timeout between iterations rather than a plain `sleep`, so a
//! `Stop` request is observed within one tick instead of the full
//! remaining interval — keeping worst-case stop latency near 10-20ms
//! regardless of how long the configured interval is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Runnable;
use crate::sync::{CondVar, Mutex};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Stats {
    execution_count: AtomicU64,
    total_execution_nanos: AtomicU64,
    last_execution: Mutex<Option<Instant>>,
}

/// A callback re-run every `interval` until stopped.
pub struct PeriodicRunnable {
    interval: Duration,
    run_immediately: bool,
    callback: Mutex<Box<dyn FnMut() + Send>>,
    stop_gate: Mutex<bool>,
    stop_cond: CondVar,
    stats: Stats,
}

impl PeriodicRunnable {
    pub fn new(interval: Duration, run_immediately: bool, callback: impl FnMut() + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            interval,
            run_immediately,
            callback: Mutex::new(Box::new(callback)),
            stop_gate: Mutex::new(false),
            stop_cond: CondVar::new(),
            stats: Stats {
                execution_count: AtomicU64::new(0),
                total_execution_nanos: AtomicU64::new(0),
                last_execution: Mutex::new(None),
            },
        })
    }

    pub fn execution_count(&self) -> u64 {
        self.stats.execution_count.load(Ordering::Acquire)
    }

    pub fn last_execution(&self) -> Option<Instant> {
        *self.stats.last_execution.lock()
    }

    /// Mean execution duration of the callback across all runs so far.
    pub fn average_execution_time(&self) -> Duration {
        let count = self.stats.execution_count.load(Ordering::Acquire);
        if count == 0 {
            return Duration::ZERO;
        }
        let total = self.stats.total_execution_nanos.load(Ordering::Acquire);
        Duration::from_nanos(total / count)
    }

    /// Wake an in-progress wait immediately; used by callers stopping
    /// this runnable via its own handle rather than a `RunnablePool`.
    pub fn wake(&self) {
        *self.stop_gate.lock() = true;
        self.stop_cond.notify_all();
    }

    fn execute_once(&self) {
        let start = Instant::now();
        (self.callback.lock())();
        let elapsed = start.elapsed();
        self.stats.execution_count.fetch_add(1, Ordering::AcqRel);
        self.stats
            .total_execution_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::AcqRel);
        *self.stats.last_execution.lock() = Some(start);
    }
}

impl Runnable for PeriodicRunnable {
    fn run(&self, should_stop: &dyn Fn() -> bool) {
        if self.run_immediately && !should_stop() {
            self.execute_once();
        }

        let mut next_due = Instant::now() + self.interval;
        while !should_stop() {
            let now = Instant::now();
            if now >= next_due {
                self.execute_once();
                next_due = Instant::now() + self.interval;
                continue;
            }
            let remaining = (next_due - now).min(POLL_INTERVAL);
            let guard = self.stop_gate.lock();
            let (_, _) = self.stop_cond.wait_timeout(guard, remaining);
        }
    }
}
