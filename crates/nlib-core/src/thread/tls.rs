// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Typed per-thread storage slot (§4.2).
//!
//! `std::thread_local!` only declares *static* slots known at compile
//! time; the spec wants a slot that is itself a value (created,
//! passed around, and dropped like any other object). `thread_local`'s
//! `ThreadLocal<T>` gives each accessing thread its own lazily
//! initialized `T`, which is exactly that shape.

use std::cell::RefCell;

use thread_local::ThreadLocal;

/// A slot holding an independent `Option<T>` per thread that touches
/// it. Reading from a thread that has never called `set` observes
/// `None`.
pub struct ThreadLocalSlot<T: 'static> {
    inner: ThreadLocal<RefCell<Option<T>>>,
}

impl<T: 'static> ThreadLocalSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: ThreadLocal::new(),
        }
    }

    /// Set this thread's value, replacing any previous one.
    pub fn set(&self, value: T) {
        *self.cell().borrow_mut() = Some(value);
    }

    /// Clear this thread's value.
    pub fn clear(&self) {
        *self.cell().borrow_mut() = None;
    }

    fn cell(&self) -> &RefCell<Option<T>> {
        self.inner.get_or(|| RefCell::new(None))
    }
}

impl<T: 'static + Clone> ThreadLocalSlot<T> {
    /// Fetch a clone of this thread's value, if set.
    pub fn get(&self) -> Option<T> {
        self.cell().borrow().clone()
    }
}

impl<T: 'static> ThreadLocalSlot<T> {
    /// Run `f` against this thread's slot in place, avoiding a clone.
    pub fn with<R>(&self, f: impl FnOnce(&mut Option<T>) -> R) -> R {
        f(&mut self.cell().borrow_mut())
    }
}

impl<T: 'static> Default for ThreadLocalSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn get_set_roundtrip() {
        let slot: ThreadLocalSlot<i32> = ThreadLocalSlot::new();
        assert_eq!(slot.get(), None);
        slot.set(7);
        assert_eq!(slot.get(), Some(7));
    }

    #[test]
    fn slots_are_independent_per_thread() {
        let slot = Arc::new(ThreadLocalSlot::<i32>::new());
        slot.set(1);

        let other = slot.clone();
        let handle = thread::spawn(move || {
            assert_eq!(other.get(), None);
            other.set(2);
            other.get()
        });
        assert_eq!(handle.join().unwrap(), Some(2));
        assert_eq!(slot.get(), Some(1));
    }

    #[test]
    fn with_mutates_in_place() {
        let slot: ThreadLocalSlot<Vec<i32>> = ThreadLocalSlot::new();
        slot.set(Vec::new());
        slot.with(|v| v.as_mut().unwrap().push(1));
        slot.with(|v| v.as_mut().unwrap().push(2));
        assert_eq!(slot.with(|v| v.clone()), Some(vec![1, 2]));
    }

    #[test]
    fn clear_resets_to_none() {
        let slot: ThreadLocalSlot<&str> = ThreadLocalSlot::new();
        slot.set("hi");
        slot.clear();
        assert_eq!(slot.get(), None);
    }
}
