// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Operational error types, one enum per component boundary.
//!
//! Programming errors (contract violations — double-lock, unowned
//! condvar wait, a dropped-unconsumed affine handle) are `panic!`s at
//! the violation site, not values here. Only transient/environmental
//! failures are modeled as `Result`.

use thiserror::Error;

/// Errors from [`crate::sync`] primitives.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("semaphore release of {0} would exceed the maximum count of {1}")]
    SemaphoreOverRelease(usize, usize),
    #[error("wait timed out")]
    TimedOut,
}

/// Errors from [`crate::task`] — captured on a faulted task or future.
#[derive(Debug, Error, Clone)]
pub enum TaskError {
    #[error("{0}")]
    Faulted(String),
    #[error("task was cancelled")]
    Cancelled,
}

/// Errors from [`crate::scheduler`].
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("scheduler is shutting down, no new tasks are accepted")]
    ShuttingDown,
}

/// Errors from [`crate::events`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher has no scheduler attached for asynchronous dispatch")]
    NoSchedulerAttached,
}

/// Errors from [`crate::io`].
#[derive(Debug, Error)]
pub enum IoLoopError {
    #[error("platform multiplexer error: {0}")]
    Multiplexer(#[source] std::io::Error),
    #[error("socket error: {0}")]
    Socket(#[source] std::io::Error),
    #[error("event loop already shut down")]
    ShutDown,
}

/// Errors from [`crate::object`].
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("self-reference requested on an object that is not currently strong-owned")]
    NotStrongOwned,
}

/// Errors from [`crate::resource`].
#[derive(Debug, Error, Clone)]
pub enum ResourceError {
    #[error("dependency `{0}` is not loaded")]
    DependencyNotLoaded(String),
    #[error("load already in progress on another thread")]
    LoadInProgress,
    #[error("no factory registered for resource type `{0}`")]
    NoFactory(String),
    #[error("{0}")]
    LoadFailed(String),
}

/// Umbrella error for call sites that span more than one component.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    IoLoop(#[from] IoLoopError),
    #[error(transparent)]
    Object(#[from] ObjectError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

pub type CoreResult<T> = Result<T, CoreError>;
