// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Handler/filter/interceptor registry and the per-event dispatch
//! algorithm (§4.5).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::filter::{Filter, Interceptor};
use super::stats::StatsInner;
use super::EventEnvelope;
use crate::sync::Mutex;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque handle returned at registration; the only way to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(u64);

impl HandlerToken {
    fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Dispatch priority: higher runs first. A thin newtype rather than a
/// bare `i32` so call sites read `Priority::HIGH` instead of a magic
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub i32);

impl Priority {
    pub const LOW: Priority = Priority(-10);
    pub const NORMAL: Priority = Priority(0);
    pub const HIGH: Priority = Priority(10);
    pub const CRITICAL: Priority = Priority(100);
}

type HandlerFn = Box<dyn FnMut(&EventEnvelope) + Send>;
type ErrorHandler = Box<dyn Fn(&EventEnvelope, String) + Send + Sync>;

struct HandlerEntry {
    token: HandlerToken,
    tag: Option<&'static str>,
    priority: Priority,
    enabled: AtomicBool,
    handler: Arc<Mutex<HandlerFn>>,
}

struct FilterEntry {
    token: HandlerToken,
    filter: Arc<dyn Filter>,
}

struct InterceptorEntry {
    token: HandlerToken,
    priority: Priority,
    interceptor: Arc<dyn Interceptor>,
}

struct Inner {
    handlers: Mutex<Vec<HandlerEntry>>,
    filters: Mutex<Vec<FilterEntry>>,
    interceptors: Mutex<Vec<InterceptorEntry>>,
}

/// Owns every registered handler/filter/interceptor. Cheaply clonable
/// (an `Arc` handle) so the asynchronous dispatch path can carry a
/// copy into a scheduled task without borrowing the [`super::Dispatcher`].
#[derive(Clone)]
pub(super) struct HandlerRegistry {
    inner: Arc<Inner>,
}

impl HandlerRegistry {
    pub(super) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(Vec::new()),
                filters: Mutex::new(Vec::new()),
                interceptors: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(super) fn clone_handle(&self) -> Self {
        self.clone()
    }

    pub(super) fn register_global(
        &self,
        priority: Priority,
        handler: impl FnMut(&EventEnvelope) + Send + 'static,
    ) -> HandlerToken {
        let token = HandlerToken::next();
        self.inner.handlers.lock().push(HandlerEntry {
            token,
            tag: None,
            priority,
            enabled: AtomicBool::new(true),
            handler: Arc::new(Mutex::new(Box::new(handler))),
        });
        token
    }

    pub(super) fn register_for_type(
        &self,
        tag: &'static str,
        priority: Priority,
        handler: impl FnMut(&EventEnvelope) + Send + 'static,
    ) -> HandlerToken {
        let token = HandlerToken::next();
        self.inner.handlers.lock().push(HandlerEntry {
            token,
            tag: Some(tag),
            priority,
            enabled: AtomicBool::new(true),
            handler: Arc::new(Mutex::new(Box::new(handler))),
        });
        token
    }

    pub(super) fn register_filter(&self, filter: impl Filter + 'static) -> HandlerToken {
        let token = HandlerToken::next();
        self.inner.filters.lock().push(FilterEntry {
            token,
            filter: Arc::new(filter),
        });
        token
    }

    pub(super) fn register_interceptor(&self, priority: Priority, interceptor: impl Interceptor + 'static) -> HandlerToken {
        let token = HandlerToken::next();
        self.inner.interceptors.lock().push(InterceptorEntry {
            token,
            priority,
            interceptor: Arc::new(interceptor),
        });
        token
    }

    /// Remove exactly the entry registered under `token`, whichever
    /// of the three lists it lives in.
    pub(super) fn unregister(&self, token: HandlerToken) {
        self.inner.handlers.lock().retain(|e| e.token != token);
        self.inner.filters.lock().retain(|e| e.token != token);
        self.inner.interceptors.lock().retain(|e| e.token != token);
    }

    /// Enable or disable a registered handler without unregistering
    /// it, preserving its place (and priority ordering) in the
    /// registry. Returns `false` if `token` doesn't name a handler
    /// (it may have been unregistered, or name a filter/interceptor
    /// instead). Disabled handlers are skipped by `dispatch`.
    pub(super) fn set_enabled(&self, token: HandlerToken, enabled: bool) -> bool {
        match self.inner.handlers.lock().iter().find(|e| e.token == token) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Run the full per-event algorithm: filters, interceptors in
    /// priority order, then the merged handler list by priority
    /// descending (ties keep registration order).
    pub(super) fn dispatch(&self, event: &EventEnvelope, stats: &StatsInner, error_handler: &Mutex<Option<ErrorHandler>>) {
        stats.record_dispatched();
        let started = std::time::Instant::now();

        let filters: Vec<Arc<dyn Filter>> = self.inner.filters.lock().iter().map(|e| e.filter.clone()).collect();
        for filter in filters {
            if !filter.accepts(event) {
                stats.record_cancelled();
                return;
            }
        }

        let mut interceptors: Vec<(Priority, Arc<dyn Interceptor>)> = self
            .inner
            .interceptors
            .lock()
            .iter()
            .map(|e| (e.priority, e.interceptor.clone()))
            .collect();
        interceptors.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, interceptor) in interceptors {
            if !interceptor.intercept(event) {
                stats.record_cancelled();
                return;
            }
        }

        // Snapshot (token, tag, priority), sorted by priority descending
        // with registration order preserved for ties, then resolve each
        // handler's `Arc` individually so the registry isn't locked for
        // the duration of user code (a handler may itself register or
        // unregister during dispatch).
        let mut order: Vec<(HandlerToken, Priority, Arc<Mutex<HandlerFn>>)> = self
            .inner
            .handlers
            .lock()
            .iter()
            .filter(|e| e.enabled.load(Ordering::Acquire) && (e.tag.is_none() || e.tag == Some(event.tag)))
            .map(|e| (e.token, e.priority, e.handler.clone()))
            .collect();
        order.sort_by(|a, b| b.1.cmp(&a.1));

        for (token, _, handler) in order {
            if event.is_cancelled() {
                break;
            }
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (*handler.lock())(event);
            }));
            match result {
                Ok(()) => stats.record_handled(token),
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    if let Some(handler) = error_handler.lock().as_ref() {
                        handler(event, message);
                    } else {
                        tracing::error!(error = %message, "event handler panicked");
                    }
                }
            }
        }

        stats.record_processing_time(started.elapsed());
    }
}
