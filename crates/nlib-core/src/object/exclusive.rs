// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Movable-only, non-reference-counted owning pointer (§4.7).

/// No counting, no shared ownership: just `Box<T>` re-exported under
/// the spec's `Strong<T>`/`Weak<T>`/`Exclusive<T>` vocabulary for
/// symmetry. Zero overhead beyond the null check `Box` already pays.
pub type Exclusive<T> = Box<T>;
