// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Priority-ordered task scheduler and runnable pool (§4.4).
//!
//! Grounded in the teacher's `green::scheduler::Scheduler`: N worker
//! threads, a `(Mutex<bool>, CondVar)` pair gating "work available",
//! another gating "all done", an `AtomicUsize` active-task counter,
//! and a shutdown flag workers poll between iterations. The teacher's
//! scheduler is work-stealing across per-worker local queues; this one
//! instead shares a single priority queue, because the spec's ordering
//! guarantee (highest priority first, FIFO within a class) is only
//! meaningful relative to one global queue.

mod global;
mod periodic;
mod queue;
mod runnable;

pub use global::{background_scheduler, default_scheduler};
pub use periodic::PeriodicRunnable;
pub use queue::Schedulable;
pub use runnable::{Runnable, RunnablePool};

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use queue::{Entry, PriorityQueue};

use crate::config::ConfigSource;
use crate::error::ScheduleError;
use crate::sync::{CondVar, Mutex};
use crate::task::Task;

/// Priority class of a scheduled task. `Critical` always preempts
/// pending `Low`/`Normal`/`High` work at the next dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl<T: Send + Sync + 'static> Schedulable for Task<T> {
    fn run(&self) {
        Task::run(self)
    }
}

struct Shared {
    queue: Mutex<PriorityQueue>,
    work_available: CondVar,
    all_done: CondVar,
    active_count: AtomicUsize,
    pending_count: AtomicUsize,
    next_seq: AtomicU64,
    shutdown: AtomicBool,
}

/// A pool of worker threads consuming a shared priority-ordered queue.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// `worker_count = 0` defaults to the hardware concurrency hint.
    pub fn new(worker_count: usize) -> Self {
        let worker_count = if worker_count == 0 {
            crate::thread::hardware_concurrency()
        } else {
            worker_count
        };

        let shared = Arc::new(Shared {
            queue: Mutex::new(PriorityQueue::new()),
            work_available: CondVar::new(),
            all_done: CondVar::new(),
            active_count: AtomicUsize::new(0),
            pending_count: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        });

        let workers = (0..worker_count)
            .map(|id| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("nlib-scheduler-{id}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn scheduler worker thread")
            })
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Build a scheduler sized from `key`, falling back to `default`
    /// if the source has no value (or the value doesn't parse).
    pub fn from_config(source: &dyn ConfigSource, key: &str, default: usize) -> Self {
        Self::new(source.get_usize(key).unwrap_or(default))
    }

    /// Enqueue a task for execution by the next available worker.
    pub fn schedule<T: Send + Sync + 'static>(
        &self,
        task: Arc<Task<T>>,
        priority: TaskPriority,
    ) -> Result<(), ScheduleError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(ScheduleError::ShuttingDown);
        }
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut queue = self.shared.queue.lock();
            self.shared.pending_count.fetch_add(1, Ordering::AcqRel);
            queue.push(Entry::new(task, priority, seq));
        }
        self.shared.work_available.notify_one();
        Ok(())
    }

    pub fn active_count(&self) -> usize {
        self.shared.active_count.load(Ordering::Acquire)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending_count.load(Ordering::Acquire)
    }

    /// Block until both counters reach zero, or `timeout` elapses if
    /// given. Returns whether the drain was observed.
    pub fn wait_for_all_tasks(&self, timeout: Option<Duration>) -> bool {
        let is_done = || {
            self.shared.active_count.load(Ordering::Acquire) == 0
                && self.shared.pending_count.load(Ordering::Acquire) == 0
        };
        let guard = self.shared.queue.lock();
        match timeout {
            None => {
                let _ = self.shared.all_done.wait_while(guard, |_| !is_done());
                true
            }
            Some(timeout) => {
                if is_done() {
                    return true;
                }
                let (_, result) = self.shared.all_done.wait_timeout(guard, timeout);
                !result.timed_out || is_done()
            }
        }
    }

    /// Stop immediately: wake workers, join them, discard whatever is
    /// still queued. Tasks already in flight run to completion.
    pub fn stop(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.queue.lock().drain();
        self.shared.work_available.notify_all();
        self.join_workers();
    }

    /// Stop accepting new tasks, wait up to `timeout` for active and
    /// pending work to drain, then fall back to [`Scheduler::stop`] if
    /// the deadline passes with work still outstanding.
    pub fn stop_gracefully(&self, timeout: Duration) {
        self.shared.shutdown.store(true, Ordering::Release);
        if !self.wait_for_all_tasks(Some(timeout)) {
            tracing::warn!("scheduler graceful stop timed out, discarding pending tasks");
        }
        self.stop();
    }

    fn join_workers(&self) {
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.shared.shutdown.load(Ordering::Acquire) {
            self.stop();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let entry = {
            let guard = shared.queue.lock();
            let mut guard = shared
                .work_available
                .wait_while(guard, |q| q.is_empty() && !shared.shutdown.load(Ordering::Acquire));
            let entry = guard.pop();
            if entry.is_some() {
                shared.pending_count.fetch_sub(1, Ordering::AcqRel);
                shared.active_count.fetch_add(1, Ordering::AcqRel);
            }
            entry
        };

        let Some(entry) = entry else {
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            continue;
        };

        entry.task.run();

        // `all_done` pairs with `queue`'s lock the same way
        // `work_available` does above: the decrement-to-zero and the
        // notify must happen while holding the lock `wait_for_all_tasks`
        // checks its predicate under, or a waiter can observe
        // `is_done() == false` and park *after* this notify already
        // fired, missing it forever.
        let guard = shared.queue.lock();
        let prev_active = shared.active_count.fetch_sub(1, Ordering::AcqRel);
        if prev_active == 1 && shared.pending_count.load(Ordering::Acquire) == 0 {
            shared.all_done.notify_all();
        }
        drop(guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn schedule_runs_task_and_resolves_its_future() {
        let scheduler = Scheduler::new(2);
        let task = Arc::new(Task::new(|_token| 7));
        let future = task.future();
        scheduler.schedule(task, TaskPriority::Normal).unwrap();
        match future.result() {
            crate::task::Outcome::Completed(v) => assert_eq!(*v, 7),
            _ => panic!("expected Completed"),
        }
    }

    #[test]
    fn wait_for_all_tasks_blocks_until_drained() {
        let scheduler = Scheduler::new(2);
        for _ in 0..5 {
            scheduler
                .schedule(Arc::new(Task::new(|_token| ())), TaskPriority::Normal)
                .unwrap();
        }
        assert!(scheduler.wait_for_all_tasks(Some(Duration::from_secs(1))));
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn higher_priority_runs_before_lower_when_queued_together() {
        let scheduler = Scheduler::new(1);
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let gate = Arc::new(Mutex::new(false));
        let gate_cond = Arc::new(CondVar::new());
        let gate2 = gate.clone();
        let gate_cond2 = gate_cond.clone();
        let blocker = Arc::new(Task::new(move |_token| {
            let guard = gate2.lock();
            let _ = gate_cond2.wait_while(guard, |open| !*open);
        }));
        scheduler.schedule(blocker, TaskPriority::Normal).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let mut tasks = Vec::new();
        for (label, priority) in [
            ("low", TaskPriority::Low),
            ("critical", TaskPriority::Critical),
            ("normal", TaskPriority::Normal),
        ] {
            let order = order.clone();
            let task = Arc::new(Task::new(move |_token| {
                order.lock().push(label);
            }));
            tasks.push(task.clone());
            scheduler.schedule(task, priority).unwrap();
        }

        *gate.lock() = true;
        gate_cond.notify_all();

        for task in &tasks {
            task.wait();
        }

        assert_eq!(*order.lock(), vec!["critical", "normal", "low"]);
    }

    #[test]
    fn schedule_after_stop_is_rejected() {
        let scheduler = Scheduler::new(1);
        scheduler.stop();
        let result = scheduler.schedule(Arc::new(Task::new(|_token| ())), TaskPriority::Normal);
        assert!(matches!(result, Err(ScheduleError::ShuttingDown)));
    }
}
