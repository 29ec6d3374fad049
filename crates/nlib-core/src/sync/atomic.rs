// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Generic atomic cell plus named integer atomics (§4.1).
//!
//! `Atomic<T>` covers arbitrary `Copy` payloads (load/store/exchange/
//! compare-exchange) via a mutex, for types that have no native atomic
//! instruction. The named `AtomicI32`/`AtomicI64`/`AtomicUsize`/…
//! wrappers below delegate straight to `std::sync::atomic` for the
//! integral fast path, adding the `FetchAdd`/`FetchSub`/increment/
//! decrement surface the spec asks for on top.

use std::sync::atomic::Ordering;
use std::sync::Mutex;

/// Sequentially-consistent atomic cell for any `Copy` type.
pub struct Atomic<T: Copy> {
    inner: Mutex<T>,
}

impl<T: Copy> Atomic<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub fn load(&self) -> T {
        *self.inner.lock().unwrap()
    }

    pub fn store(&self, value: T) {
        *self.inner.lock().unwrap() = value;
    }

    pub fn exchange(&self, value: T) -> T {
        std::mem::replace(&mut *self.inner.lock().unwrap(), value)
    }
}

impl<T: Copy + PartialEq> Atomic<T> {
    /// Replace the value with `new` iff it currently equals `expected`.
    /// Returns whether the replacement happened; on failure, the
    /// caller's `expected` is left untouched (the caller already has
    /// its own copy — there is nothing to update in Rust's by-value
    /// calling convention, unlike an out-parameter in C++).
    pub fn compare_exchange(&self, expected: T, new: T) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if *guard == expected {
            *guard = new;
            true
        } else {
            false
        }
    }
}

macro_rules! define_atomic_int {
    ($name:ident, $std_ty:ty, $int_ty:ty) => {
        /// Atomic integer backed directly by `std::sync::atomic`.
        pub struct $name {
            inner: $std_ty,
        }

        impl $name {
            pub fn new(value: $int_ty) -> Self {
                Self {
                    inner: <$std_ty>::new(value),
                }
            }

            pub fn load(&self) -> $int_ty {
                self.inner.load(Ordering::SeqCst)
            }

            pub fn store(&self, value: $int_ty) {
                self.inner.store(value, Ordering::SeqCst)
            }

            pub fn exchange(&self, value: $int_ty) -> $int_ty {
                self.inner.swap(value, Ordering::SeqCst)
            }

            /// Replace iff current value equals `expected`. Returns
            /// `Ok(previous)` on success, `Err(actual)` on failure —
            /// the actual-value-on-failure the spec calls "updates
            /// expected on failure".
            pub fn compare_exchange(
                &self,
                expected: $int_ty,
                new: $int_ty,
            ) -> Result<$int_ty, $int_ty> {
                self.inner
                    .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
            }

            pub fn fetch_add(&self, delta: $int_ty) -> $int_ty {
                self.inner.fetch_add(delta, Ordering::SeqCst)
            }

            pub fn fetch_sub(&self, delta: $int_ty) -> $int_ty {
                self.inner.fetch_sub(delta, Ordering::SeqCst)
            }

            /// Pre-increment: returns the value after incrementing.
            pub fn increment(&self) -> $int_ty {
                self.fetch_add(1) + 1
            }

            /// Post-increment: returns the value before incrementing.
            pub fn increment_post(&self) -> $int_ty {
                self.fetch_add(1)
            }

            /// Pre-decrement: returns the value after decrementing.
            pub fn decrement(&self) -> $int_ty {
                self.fetch_sub(1) - 1
            }

            /// Post-decrement: returns the value before decrementing.
            pub fn decrement_post(&self) -> $int_ty {
                self.fetch_sub(1)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(Default::default())
            }
        }
    };
}

define_atomic_int!(AtomicI32, std::sync::atomic::AtomicI32, i32);
define_atomic_int!(AtomicI64, std::sync::atomic::AtomicI64, i64);
define_atomic_int!(AtomicU32, std::sync::atomic::AtomicU32, u32);
define_atomic_int!(AtomicU64, std::sync::atomic::AtomicU64, u64);
define_atomic_int!(AtomicUsize, std::sync::atomic::AtomicUsize, usize);
define_atomic_int!(AtomicIsize, std::sync::atomic::AtomicIsize, isize);
