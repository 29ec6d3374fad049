// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Long-lived worker abstraction distinct from one-shot [`crate::task::Task`]s
//! (§4.4).
//!
//! A [`Runnable`] owns its own lifecycle (`Initialize`/`Run`/`Stop`/
//! `Shutdown`) instead of completing once like a task; [`RunnablePool`]
//! runs a fixed set of them each on its own OS thread, FIFO over the
//! pool's own registration order, mirroring the teacher's background
//! worker threads in `green::scheduler` but without work-stealing —
//! each `Runnable` pins to the thread that started it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::sync::Mutex;

/// A cooperative long-running worker. `run` should poll
/// [`Runnable::should_stop`] periodically and return once it observes
/// it; `Stop` merely requests, it does not forcibly interrupt.
pub trait Runnable: Send + Sync + 'static {
    fn initialize(&self) {}
    fn run(&self, should_stop: &dyn Fn() -> bool);
    fn shutdown(&self) {}
}

struct Entry {
    handle: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
}

/// A fixed pool of [`Runnable`]s, each given its own OS thread.
pub struct RunnablePool {
    entries: Mutex<Vec<Entry>>,
}

impl RunnablePool {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register and start a runnable. Returns its index in the pool,
    /// usable as a handle for [`RunnablePool::stop_one`].
    pub fn spawn(&self, name: impl Into<String>, runnable: Arc<dyn Runnable>) -> usize {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag_for_thread = stop_flag.clone();
        let name = name.into();
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                runnable.initialize();
                runnable.run(&move || flag_for_thread.load(Ordering::Acquire));
                runnable.shutdown();
            })
            .expect("failed to spawn runnable thread");

        let mut entries = self.entries.lock();
        entries.push(Entry {
            handle: Some(handle),
            stop_flag,
        });
        entries.len() - 1
    }

    /// Request the runnable at `index` to stop; does not wait for it.
    pub fn stop_one(&self, index: usize) {
        if let Some(entry) = self.entries.lock().get(index) {
            entry.stop_flag.store(true, Ordering::Release);
        }
    }

    /// Request every runnable to stop and join all threads.
    pub fn stop_all(&self) {
        let mut entries = self.entries.lock();
        for entry in entries.iter() {
            entry.stop_flag.store(true, Ordering::Release);
        }
        for entry in entries.iter_mut() {
            if let Some(handle) = entry.handle.take() {
                let _ = handle.join();
            }
        }
    }

    /// Request stop, then join all threads, up to `timeout`. Returns
    /// whether every thread joined within the window; threads that
    /// don't are simply detached (never forcibly killed).
    pub fn stop_gracefully(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut entries = self.entries.lock();
        for entry in entries.iter() {
            entry.stop_flag.store(true, Ordering::Release);
        }
        let mut all_joined = true;
        for entry in entries.iter_mut() {
            if let Some(handle) = entry.handle.take() {
                if std::time::Instant::now() >= deadline || !handle.is_finished() {
                    while !handle.is_finished() && std::time::Instant::now() < deadline {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                }
                if handle.is_finished() {
                    let _ = handle.join();
                } else {
                    all_joined = false;
                    entry.handle = Some(handle);
                }
            }
        }
        all_joined
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for RunnablePool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunnablePool {
    fn drop(&mut self) {
        self.stop_all();
    }
}
