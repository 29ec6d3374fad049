// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Self-reference mixin (§4.7).
//!
//! An object that wants to hand out a `Strong<Self>` from inside one
//! of its own `&self` methods needs somewhere to keep a `Weak<Self>`
//! that was captured at construction time — grounded in the
//! store-a-`Weak<Self>`-right-after-construction pattern used for
//! `HotSwapPipeline::self_ref` in the wider codebase this crate draws
//! its ambient stack from.

use super::{Strong, Weak};
use crate::error::ObjectError;

/// A slot embedded in a type that wants a self-reference. Bound once,
/// by [`Strong::new_cyclic`], before the value is ever observed.
pub struct SelfRefSlot<T> {
    weak: std::sync::OnceLock<Weak<T>>,
}

impl<T> SelfRefSlot<T> {
    pub fn empty() -> Self {
        Self {
            weak: std::sync::OnceLock::new(),
        }
    }

    /// Bind the slot. Only the first call takes effect; later calls
    /// (there should be none) are no-ops, matching the "written once
    /// at construction" contract.
    pub(super) fn bind(&self, weak: Weak<T>) {
        let _ = self.weak.set(weak);
    }

    /// Obtain a strong pointer to the owning object. Fails if called
    /// before the slot was bound, or once the object is no longer
    /// strong-owned (its destructor is running or has already run).
    pub fn get(&self) -> Result<Strong<T>, ObjectError> {
        self.weak
            .get()
            .and_then(Weak::upgrade)
            .ok_or(ObjectError::NotStrongOwned)
    }
}

impl<T> Default for SelfRefSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Implemented by types that embed a [`SelfRefSlot`] and want it wired
/// up automatically by [`Strong::new_self_referencing`].
pub trait SelfReferencing: Sized {
    fn self_ref_slot(&self) -> &SelfRefSlot<Self>;
}

impl<T: SelfReferencing> Strong<T> {
    /// Construct a strong-owned `T` whose [`SelfRefSlot`] is bound
    /// before `make` ever gets a chance to hand `&T` to anyone else.
    pub fn new_self_referencing(make: impl FnOnce() -> T) -> Self {
        let strong = Strong::new_cyclic(|_weak| make());
        let bound_weak = Strong::downgrade(&strong);
        strong.self_ref_slot().bind(bound_weak);
        strong
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        slot: SelfRefSlot<Node>,
        label: &'static str,
    }

    impl SelfReferencing for Node {
        fn self_ref_slot(&self) -> &SelfRefSlot<Node> {
            &self.slot
        }
    }

    #[test]
    fn self_ref_resolves_to_same_identity() {
        let node = Strong::new_self_referencing(|| Node {
            slot: SelfRefSlot::empty(),
            label: "root",
        });
        let via_self = node.self_ref_slot().get().expect("strong-owned");
        assert_eq!(via_self.id(), node.id());
        assert_eq!(via_self.label, "root");
    }

    #[test]
    fn self_ref_fails_once_destroyed() {
        let slot_copy;
        {
            let node = Strong::new_self_referencing(|| Node {
                slot: SelfRefSlot::empty(),
                label: "temp",
            });
            slot_copy = Strong::downgrade(&node);
        }
        assert!(slot_copy.upgrade().is_none());
    }
}
