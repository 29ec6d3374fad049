// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Platform I/O event loop: Reactor and Proactor modes over a shared
//! timer/posted-task core (§4.6).

mod posted_task;
mod proactor;
mod reactor;
mod tcp;
mod timer;
mod udp;

pub use proactor::{AsyncOutcome, SimulatedProactor};
pub use reactor::{Interest, Readiness, SocketToken};
pub use tcp::{TcpClientCallbacks, TcpClientReactor, TcpServerCallbacks, TcpServerReactor};
pub use timer::TimerId;
pub use udp::{UdpCallbacks, UdpReactor};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::event::Source;

use posted_task::PostedTaskQueue;
use reactor::Reactor;
use timer::TimerRegistry;

use crate::error::IoLoopError;

/// Receives readiness callbacks from [`EventLoop::run_once`]. Owned by
/// the caller; the loop itself holds no handler state.
pub trait IoHandler: Send {
    fn on_ready(&mut self, token: SocketToken, readiness: Readiness);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoopStats {
    pub events_processed: u64,
    pub timers_executed: u64,
    pub tasks_executed: u64,
    pub average_dispatch_nanos: u64,
}

struct StatsInner {
    events_processed: AtomicU64,
    timers_executed: AtomicU64,
    tasks_executed: AtomicU64,
    iterations: AtomicU64,
    total_dispatch_nanos: AtomicU64,
}

impl StatsInner {
    fn new() -> Self {
        Self {
            events_processed: AtomicU64::new(0),
            timers_executed: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            total_dispatch_nanos: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> LoopStats {
        let iterations = self.iterations.load(Ordering::Acquire).max(1);
        LoopStats {
            events_processed: self.events_processed.load(Ordering::Acquire),
            timers_executed: self.timers_executed.load(Ordering::Acquire),
            tasks_executed: self.tasks_executed.load(Ordering::Acquire),
            average_dispatch_nanos: self.total_dispatch_nanos.load(Ordering::Acquire) / iterations,
        }
    }

    fn reset(&self) {
        self.events_processed.store(0, Ordering::Release);
        self.timers_executed.store(0, Ordering::Release);
        self.tasks_executed.store(0, Ordering::Release);
        self.iterations.store(0, Ordering::Release);
        self.total_dispatch_nanos.store(0, Ordering::Release);
    }
}

/// The abstract event loop base (§4.6): watched sockets, timers, and a
/// posted-task queue, multiplexed through one `mio::Poll`.
pub struct EventLoop {
    reactor: Reactor,
    timers: TimerRegistry,
    posted: PostedTaskQueue,
    stats: StatsInner,
    running: AtomicBool,
}

impl EventLoop {
    pub fn new() -> Result<Self, IoLoopError> {
        Ok(Self {
            reactor: Reactor::new().map_err(IoLoopError::Multiplexer)?,
            timers: TimerRegistry::new(),
            posted: PostedTaskQueue::new(),
            stats: StatsInner::new(),
            running: AtomicBool::new(false),
        })
    }

    pub fn add_socket(&self, source: &mut dyn Source, interest: Interest) -> Result<SocketToken, IoLoopError> {
        self.reactor.register(source, interest).map_err(IoLoopError::Socket)
    }

    pub fn modify_socket(&self, source: &mut dyn Source, token: SocketToken, interest: Interest) -> Result<(), IoLoopError> {
        self.reactor.reregister(source, token, interest).map_err(IoLoopError::Socket)
    }

    pub fn remove_socket(&self, source: &mut dyn Source) -> Result<(), IoLoopError> {
        self.reactor.deregister(source).map_err(IoLoopError::Socket)
    }

    /// Post a task to run on the loop's own thread at the start of its
    /// next iteration, waking it if it is currently blocked in the
    /// multiplexer.
    pub fn post_task(&self, task: impl FnOnce() + Send + 'static) {
        self.posted.post(task);
        self.reactor.wake();
    }

    pub fn post_delayed_task(&self, delay: Duration, task: impl FnOnce() + Send + 'static) -> TimerId {
        let mut slot = Some(Box::new(task) as Box<dyn FnOnce() + Send>);
        let id = self.timers.add(delay, None, move || {
            if let Some(task) = slot.take() {
                task();
            }
        });
        self.reactor.wake();
        id
    }

    pub fn add_timer(&self, interval: Duration, repeating: bool, callback: impl FnMut() + Send + 'static) -> TimerId {
        let id = self
            .timers
            .add(interval, repeating.then_some(interval), callback);
        self.reactor.wake();
        id
    }

    pub fn remove_timer(&self, id: TimerId) -> bool {
        self.timers.remove(id)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.reactor.wake();
    }

    pub fn stats(&self) -> LoopStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// One iteration: sleep budget, multiplex, dispatch readiness,
    /// fire due timers, drain posted tasks.
    pub fn run_once(&self, timeout: Option<Duration>, handler: &mut dyn IoHandler) -> Result<(), IoLoopError> {
        let started = Instant::now();
        let budget = match (self.timers.next_expiry(), timeout) {
            (Some(expiry), Some(timeout)) => {
                let until_timer = expiry.saturating_duration_since(Instant::now());
                Some(until_timer.min(timeout))
            }
            (Some(expiry), None) => Some(expiry.saturating_duration_since(Instant::now())),
            (None, Some(timeout)) => Some(timeout),
            (None, None) => None,
        };

        let events = self.reactor.poll_once(budget).map_err(IoLoopError::Multiplexer)?;
        self.stats.events_processed.fetch_add(events.len() as u64, Ordering::AcqRel);
        for (token, readiness) in events {
            handler.on_ready(token, readiness);
        }

        let fired = self.timers.fire_expired(Instant::now());
        self.stats.timers_executed.fetch_add(fired as u64, Ordering::AcqRel);

        let ran = self.posted.drain_and_run();
        self.stats.tasks_executed.fetch_add(ran as u64, Ordering::AcqRel);

        self.stats.iterations.fetch_add(1, Ordering::AcqRel);
        self.stats
            .total_dispatch_nanos
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::AcqRel);
        Ok(())
    }

    /// Run until [`EventLoop::stop`] is called from another thread (or
    /// from within `handler`, via a posted task).
    pub fn run(&self, handler: &mut dyn IoHandler) -> Result<(), IoLoopError> {
        self.running.store(true, Ordering::Release);
        while self.running.load(Ordering::Acquire) {
            self.run_once(None, handler)?;
        }
        Ok(())
    }
}

/// Convenience: an `EventLoop` driven on its own OS thread.
pub struct EventLoopThread {
    loop_: Arc<EventLoop>,
    handle: Option<crate::thread::Thread<()>>,
}

impl EventLoopThread {
    pub fn spawn(mut handler: impl IoHandler + 'static) -> Result<Self, IoLoopError> {
        let event_loop = Arc::new(EventLoop::new()?);
        let for_thread = event_loop.clone();
        let handle = crate::thread::Thread::start("nlib-io-loop", crate::thread::ThreadPriority::Normal, move || {
            let _ = for_thread.run(&mut handler);
        });
        Ok(Self {
            loop_: event_loop,
            handle: Some(handle),
        })
    }

    pub fn event_loop(&self) -> &Arc<EventLoop> {
        &self.loop_
    }

    pub fn join(mut self) -> Result<(), crate::thread::JoinError> {
        self.loop_.stop();
        if let Some(handle) = self.handle.take() {
            handle.join()?;
        }
        Ok(())
    }
}
