// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Synchronization primitives: mutex, read/write lock, condition
//! variable, semaphore, event, and a generic atomic cell.
//!
//! Everything here is a from-scratch wrapper over `std::sync::{Mutex,
//! Condvar}` rather than a re-export, so the stronger guarantees the
//! spec asks for (writer preference on the read/write lock, bounded
//! semaphore releases) are enforced in one place instead of relying on
//! whatever the platform's native primitive happens to do.

mod atomic;
mod condvar;
mod event;
mod mutex;
mod rwlock;
mod semaphore;

pub use atomic::{Atomic, AtomicI32, AtomicI64, AtomicIsize, AtomicU32, AtomicU64, AtomicUsize};
pub use condvar::CondVar;
pub use event::{Event, EventResetMode};
pub use mutex::{Mutex, MutexGuard};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use semaphore::Semaphore;
