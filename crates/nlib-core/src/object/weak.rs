// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Non-owning weak pointer.

use std::sync::Weak as StdWeak;

use super::strong::{Managed, Strong};

/// A non-owning handle to a managed object. `upgrade` returns `None`
/// once the strong count has dropped to zero, which — because
/// [`Managed::drop`] flips the destruction flag before the value
/// itself is torn down — also means any attempt to inspect the
/// control block's `is_destroying` flag from a concurrently racing
/// thread observes the object as gone rather than half-destroyed.
pub struct Weak<T> {
    inner: StdWeak<Managed<T>>,
}

impl<T> Weak<T> {
    pub(super) fn from_inner(inner: StdWeak<Managed<T>>) -> Self {
        Self { inner }
    }

    /// Attempt to obtain a strong pointer. Fails once the object's
    /// last strong owner has gone away.
    pub fn upgrade(&self) -> Option<Strong<T>> {
        self.inner.upgrade().map(Strong::from_inner)
    }
}

impl<T> Clone for Weak<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
