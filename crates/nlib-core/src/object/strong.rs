// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Strong (owning) pointer.

use std::ops::Deref;
use std::sync::Arc;

use super::weak::Weak;
use super::ObjectBase;

pub(super) struct Managed<T> {
    pub(super) base: ObjectBase,
    pub(super) value: T,
}

impl<T> Drop for Managed<T> {
    fn drop(&mut self) {
        tracing::trace!(object_id = self.base.id(), "object destroyed");
    }
}

/// An owning, reference-counted pointer. Cloning increments the strong
/// count; the value is dropped when the last `Strong<T>` goes away.
pub struct Strong<T> {
    inner: Arc<Managed<T>>,
}

impl<T> Strong<T> {
    pub(super) fn from_inner(inner: Arc<Managed<T>>) -> Self {
        Self { inner }
    }

    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Managed {
                base: ObjectBase::new(),
                value,
            }),
        }
    }

    /// Construct with a self-reference wired up before the value is
    /// ever observed by outside code: `bind` runs with a [`Weak<T>`]
    /// that is already valid (the object is strong-owned for the
    /// whole call, since `Arc::new_cyclic` holds the strong count at 1
    /// throughout construction).
    pub fn new_cyclic(make: impl FnOnce(&Weak<T>) -> T) -> Self {
        let inner = Arc::new_cyclic(|weak_inner| Managed {
            base: ObjectBase::new(),
            value: make(&Weak::from_inner(weak_inner.clone())),
        });
        Self { inner }
    }

    /// Process-wide unique identity of the underlying object.
    pub fn id(&self) -> u64 {
        self.inner.base.id()
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn weak_count(&self) -> usize {
        Arc::weak_count(&self.inner)
    }

    /// Obtain a non-owning handle to the same object.
    pub fn downgrade(this: &Self) -> Weak<T> {
        Weak::from_inner(Arc::downgrade(&this.inner))
    }

    /// Whether `a` and `b` point at the same allocation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T> Clone for Strong<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Deref for Strong<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_and_deref() {
        let s = Strong::new(42);
        assert_eq!(*s, 42);
    }

    #[test]
    fn clone_shares_identity_and_bumps_strong_count() {
        let a = Strong::new("x");
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.strong_count(), 2);
    }

    #[test]
    fn downgrade_upgrade_roundtrip() {
        let s = Strong::new(10);
        let w = Strong::downgrade(&s);
        let upgraded = w.upgrade().expect("still strong-owned");
        assert_eq!(*upgraded, 10);
    }

    #[test]
    fn upgrade_fails_once_last_strong_dropped() {
        let s = Strong::new(10);
        let w = Strong::downgrade(&s);
        drop(s);
        assert!(w.upgrade().is_none());
    }
}
