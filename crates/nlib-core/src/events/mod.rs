// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Event dispatcher: handler registry, filters, interceptors, four
//! dispatch modes (§4.5).
//!
//! Handlers are type-erased `FnMut` closures behind a `Mutex`, in the
//! same spirit as [`crate::task::CancellationToken`]'s subscriber
//! list; a handler panic is caught with `catch_unwind` rather than
//! allowed to unwind across the dispatch loop and take out sibling
//! handlers.

mod filter;
mod handler;
mod stats;

pub use filter::{Filter, Interceptor};
pub use handler::{HandlerToken, Priority};
pub use stats::DispatchStats;

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use handler::HandlerRegistry;
use stats::StatsInner;

use crate::error::DispatchError;
use crate::scheduler::Scheduler;
use crate::sync::Mutex;

type ErrorHandler = Box<dyn Fn(&EventEnvelope, String) + Send + Sync>;

/// A single occurrence fed to the dispatcher. `tag` is the type
/// discriminant handlers filter on; `payload` carries the event's
/// data, downcast by handlers that know the concrete type.
pub struct EventEnvelope {
    tag: &'static str,
    payload: Box<dyn Any + Send>,
    cancelled: AtomicBool,
}

impl EventEnvelope {
    pub fn new(tag: &'static str, payload: impl Any + Send) -> Self {
        Self {
            tag,
            payload: Box::new(payload),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Stop remaining handlers in this dispatch from running.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run synchronously on the caller's thread.
    Immediate,
    /// Queue for the next [`Dispatcher::update`] call.
    Deferred,
    /// Hand off to the attached scheduler.
    Asynchronous,
    /// Push to a bounded ring, drained by [`Dispatcher::process_queued_events`]
    /// or by `update` when batch mode is enabled.
    Queued,
}

struct PauseState {
    global: AtomicBool,
    per_type: Mutex<std::collections::HashSet<&'static str>>,
}

/// Fans registered events out to handlers under the ordering rules in
/// §4.5: filters, then interceptors by priority, then the merged
/// global+per-type handler list by priority.
pub struct Dispatcher {
    registry: HandlerRegistry,
    deferred: Mutex<VecDeque<EventEnvelope>>,
    queued: Mutex<VecDeque<EventEnvelope>>,
    queue_capacity: usize,
    batch_mode: bool,
    pause: PauseState,
    scheduler: Option<Arc<Scheduler>>,
    error_handler: Arc<Mutex<Option<ErrorHandler>>>,
    event_log: Mutex<Option<VecDeque<(u64, &'static str)>>>,
    log_capacity: usize,
    stats: Arc<StatsInner>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_queue_capacity(1024)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            deferred: Mutex::new(VecDeque::new()),
            queued: Mutex::new(VecDeque::new()),
            queue_capacity,
            batch_mode: false,
            pause: PauseState {
                global: AtomicBool::new(false),
                per_type: Mutex::new(std::collections::HashSet::new()),
            },
            scheduler: None,
            error_handler: Arc::new(Mutex::new(None)),
            event_log: Mutex::new(None),
            log_capacity: 0,
            stats: Arc::new(StatsInner::new()),
        }
    }

    /// Attach a scheduler used for [`DispatchMode::Asynchronous`].
    pub fn attach_scheduler(&mut self, scheduler: Arc<Scheduler>) {
        self.scheduler = Some(scheduler);
    }

    pub fn set_batch_mode(&mut self, enabled: bool) {
        self.batch_mode = enabled;
    }

    pub fn set_error_handler(&mut self, handler: impl Fn(&EventEnvelope, String) + Send + Sync + 'static) {
        *self.error_handler.lock() = Some(Box::new(handler));
    }

    /// Enable the bounded event log, capacity `capacity`.
    pub fn enable_event_log(&mut self, capacity: usize) {
        self.log_capacity = capacity;
        *self.event_log.lock() = Some(VecDeque::with_capacity(capacity.min(4096)));
    }

    pub fn register_global(&self, priority: Priority, handler: impl FnMut(&EventEnvelope) + Send + 'static) -> HandlerToken {
        self.registry.register_global(priority, handler)
    }

    pub fn register_for_type(
        &self,
        tag: &'static str,
        priority: Priority,
        handler: impl FnMut(&EventEnvelope) + Send + 'static,
    ) -> HandlerToken {
        self.registry.register_for_type(tag, priority, handler)
    }

    pub fn register_filter(&self, filter: impl Filter + 'static) -> HandlerToken {
        self.registry.register_filter(filter)
    }

    pub fn register_interceptor(&self, priority: Priority, interceptor: impl Interceptor + 'static) -> HandlerToken {
        self.registry.register_interceptor(priority, interceptor)
    }

    pub fn unregister(&self, token: HandlerToken) {
        self.registry.unregister(token);
    }

    /// Enable or disable a handler in place, without losing its
    /// registration slot or priority ordering. Returns `false` if
    /// `token` no longer names a registered handler.
    pub fn set_handler_enabled(&self, token: HandlerToken, enabled: bool) -> bool {
        self.registry.set_enabled(token, enabled)
    }

    pub fn pause(&self) {
        self.pause.global.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.pause.global.store(false, Ordering::Release);
    }

    pub fn pause_type(&self, tag: &'static str) {
        self.pause.per_type.lock().insert(tag);
    }

    pub fn resume_type(&self, tag: &'static str) {
        self.pause.per_type.lock().remove(tag);
    }

    fn is_paused(&self, tag: &'static str) -> bool {
        self.pause.global.load(Ordering::Acquire) || self.pause.per_type.lock().contains(tag)
    }

    /// Submit an event under `mode`. Immediate dispatch can fail only
    /// if `mode` is Asynchronous and no scheduler is attached.
    pub fn submit(&self, event: EventEnvelope, mode: DispatchMode) -> Result<(), DispatchError> {
        self.log(&event);
        if self.is_paused(event.tag) {
            match mode {
                DispatchMode::Immediate | DispatchMode::Asynchronous => return Ok(()),
                DispatchMode::Deferred => {
                    self.deferred.lock().push_back(event);
                    return Ok(());
                }
                DispatchMode::Queued => {
                    self.push_queued(event);
                    return Ok(());
                }
            }
        }

        match mode {
            DispatchMode::Immediate => {
                self.dispatch_now(&event);
                Ok(())
            }
            DispatchMode::Deferred => {
                self.deferred.lock().push_back(event);
                Ok(())
            }
            DispatchMode::Asynchronous => {
                let scheduler = self
                    .scheduler
                    .as_ref()
                    .ok_or(DispatchError::NoSchedulerAttached)?
                    .clone();
                let registry = self.registry.clone_handle();
                let stats = self.stats.clone();
                let error_handler = self.error_handler.clone();
                let task = Arc::new(crate::task::Task::new(move |_token| {
                    registry.dispatch(&event, &stats, &error_handler);
                }));
                let _ = scheduler.schedule(task, crate::scheduler::TaskPriority::Normal);
                Ok(())
            }
            DispatchMode::Queued => {
                self.push_queued(event);
                Ok(())
            }
        }
    }

    fn push_queued(&self, event: EventEnvelope) {
        let mut queue = self.queued.lock();
        if queue.len() >= self.queue_capacity {
            queue.pop_front();
            tracing::warn!("event queue at capacity, dropping oldest entry");
        }
        queue.push_back(event);
    }

    fn log(&self, event: &EventEnvelope) {
        let mut log = self.event_log.lock();
        if let Some(log) = log.as_mut() {
            if log.len() >= self.log_capacity {
                log.pop_front();
            }
            log.push_back((self.stats.dispatched(), event.tag));
        }
    }

    /// Process deferred events, and queued events too if batch mode is
    /// enabled. Called by the host from its chosen update thread.
    pub fn update(&self) {
        let deferred: Vec<_> = self.deferred.lock().drain(..).collect();
        for event in &deferred {
            if !self.is_paused(event.tag) {
                self.dispatch_now(event);
            }
        }
        if self.batch_mode {
            self.process_queued_events();
        }
    }

    pub fn process_queued_events(&self) {
        let drained: Vec<_> = self.queued.lock().drain(..).collect();
        for event in &drained {
            if !self.is_paused(event.tag) {
                self.dispatch_now(event);
            }
        }
    }

    fn dispatch_now(&self, event: &EventEnvelope) {
        self.registry.dispatch(event, &self.stats, &self.error_handler);
    }

    pub fn stats_snapshot(&self) -> DispatchStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
