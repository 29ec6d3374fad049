// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Dispatch statistics (§4.5): counters, per-handler invocation
//! counts, processing-time min/avg/max, events-per-second.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::handler::HandlerToken;
use crate::sync::Mutex;

/// Point-in-time copy of a [`super::Dispatcher`]'s counters.
#[derive(Debug, Clone)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub handled: u64,
    pub cancelled: u64,
    pub per_handler: HashMap<HandlerToken, u64>,
    pub processing_time_min: Duration,
    pub processing_time_avg: Duration,
    pub processing_time_max: Duration,
    pub events_per_second: f64,
}

pub(super) struct StatsInner {
    dispatched: AtomicU64,
    handled: AtomicU64,
    cancelled: AtomicU64,
    per_handler: Mutex<HashMap<HandlerToken, u64>>,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
    total_nanos: AtomicU64,
    since: Mutex<Instant>,
}

impl StatsInner {
    pub(super) fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            handled: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            per_handler: Mutex::new(HashMap::new()),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            since: Mutex::new(Instant::now()),
        }
    }

    pub(super) fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Acquire)
    }

    pub(super) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::AcqRel);
    }

    pub(super) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::AcqRel);
    }

    pub(super) fn record_handled(&self, token: HandlerToken) {
        self.handled.fetch_add(1, Ordering::AcqRel);
        *self.per_handler.lock().entry(token).or_insert(0) += 1;
    }

    pub(super) fn record_processing_time(&self, elapsed: Duration) {
        let nanos = elapsed.as_nanos() as u64;
        self.total_nanos.fetch_add(nanos, Ordering::AcqRel);
        self.min_nanos.fetch_min(nanos, Ordering::AcqRel);
        self.max_nanos.fetch_max(nanos, Ordering::AcqRel);
    }

    pub(super) fn snapshot(&self) -> DispatchStats {
        let dispatched = self.dispatched.load(Ordering::Acquire);
        let total_nanos = self.total_nanos.load(Ordering::Acquire);
        let min_nanos = self.min_nanos.load(Ordering::Acquire);
        let elapsed = self.since.lock().elapsed().as_secs_f64().max(f64::EPSILON);
        DispatchStats {
            dispatched,
            handled: self.handled.load(Ordering::Acquire),
            cancelled: self.cancelled.load(Ordering::Acquire),
            per_handler: self.per_handler.lock().clone(),
            processing_time_min: if min_nanos == u64::MAX {
                Duration::ZERO
            } else {
                Duration::from_nanos(min_nanos)
            },
            processing_time_avg: if dispatched == 0 {
                Duration::ZERO
            } else {
                Duration::from_nanos(total_nanos / dispatched)
            },
            processing_time_max: Duration::from_nanos(self.max_nanos.load(Ordering::Acquire)),
            events_per_second: dispatched as f64 / elapsed,
        }
    }

    pub(super) fn reset(&self) {
        self.dispatched.store(0, Ordering::Release);
        self.handled.store(0, Ordering::Release);
        self.cancelled.store(0, Ordering::Release);
        self.per_handler.lock().clear();
        self.min_nanos.store(u64::MAX, Ordering::Release);
        self.max_nanos.store(0, Ordering::Release);
        self.total_nanos.store(0, Ordering::Release);
        *self.since.lock() = Instant::now();
    }
}
