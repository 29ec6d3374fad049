// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Timer registry for the I/O event loop (§4.6).
//!
//! A flat `Vec` under one lock rather than a binary heap: event loops
//! host at most a few dozen live timers in practice, and a linear scan
//! keeps re-arming a repeating timer a simple in-place update instead
//! of a remove-then-reinsert heap dance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct TimerEntry {
    id: u64,
    expiry: Instant,
    interval: Option<Duration>,
    callback: Box<dyn FnMut() + Send>,
}

pub(super) struct TimerRegistry {
    entries: Mutex<Vec<TimerEntry>>,
    next_id: AtomicU64,
}

impl TimerRegistry {
    pub(super) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// `interval = None` registers a single-shot timer; `Some(d)`
    /// re-arms itself by `d` after each firing.
    pub(super) fn add(&self, delay: Duration, interval: Option<Duration>, callback: impl FnMut() + Send + 'static) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push(TimerEntry {
            id,
            expiry: Instant::now() + delay,
            interval,
            callback: Box::new(callback),
        });
        TimerId(id)
    }

    pub(super) fn remove(&self, id: TimerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id.0);
        entries.len() != before
    }

    pub(super) fn next_expiry(&self) -> Option<Instant> {
        self.entries.lock().iter().map(|e| e.expiry).min()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Fire every timer whose expiry has passed `now`. Repeating
    /// timers re-arm in place; single-shot timers are removed.
    /// Returns the number fired.
    pub(super) fn fire_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let mut fired = 0;
        let mut index = 0;
        while index < entries.len() {
            if entries[index].expiry > now {
                index += 1;
                continue;
            }
            (entries[index].callback)();
            fired += 1;
            if let Some(interval) = entries[index].interval {
                entries[index].expiry = now + interval;
                index += 1;
            } else {
                entries.remove(index);
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn single_shot_timer_fires_once_and_is_removed() {
        let registry = TimerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        registry.add(Duration::ZERO, None, move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        let now = Instant::now();
        assert_eq!(registry.fire_expired(now), 1);
        assert_eq!(registry.fire_expired(now), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn repeating_timer_rearms() {
        let registry = TimerRegistry::new();
        registry.add(Duration::ZERO, Some(Duration::from_millis(5)), || {});
        let now = Instant::now();
        assert_eq!(registry.fire_expired(now), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.next_expiry().unwrap() > now);
    }

    #[test]
    fn remove_before_expiry_prevents_firing() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        let id = registry.add(Duration::from_secs(60), None, move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        assert!(registry.remove(id));
        assert_eq!(registry.len(), 0);
    }
}
