// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Process-wide default and background schedulers (§4.4).
//!
//! Both are started lazily on first access and live for the rest of
//! the process, mirroring the teacher's global thread-pool singleton
//! in `green::scheduler` but sized differently: the default scheduler
//! tracks hardware concurrency, the background scheduler is fixed at
//! two workers for low-priority/maintenance work that shouldn't
//! compete with it.

use std::sync::OnceLock;

use super::Scheduler;

static DEFAULT: OnceLock<Scheduler> = OnceLock::new();
static BACKGROUND: OnceLock<Scheduler> = OnceLock::new();

/// The process-wide scheduler, sized to hardware concurrency.
pub fn default_scheduler() -> &'static Scheduler {
    DEFAULT.get_or_init(|| Scheduler::new(0))
}

/// A small fixed-size scheduler for maintenance work that shouldn't
/// compete with [`default_scheduler`] for cores.
pub fn background_scheduler() -> &'static Scheduler {
    BACKGROUND.get_or_init(|| Scheduler::new(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scheduler_is_a_singleton() {
        let a = default_scheduler() as *const Scheduler;
        let b = default_scheduler() as *const Scheduler;
        assert_eq!(a, b);
    }

    #[test]
    fn background_scheduler_is_distinct_from_default() {
        let a = default_scheduler() as *const Scheduler;
        let b = background_scheduler() as *const Scheduler;
        assert_ne!(a, b);
    }
}
