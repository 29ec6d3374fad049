// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Priority queue of scheduled task entries (§4.4, Scheduler Queue
//! Entry in §3).
//!
//! Ordering: higher priority first; ties broken by earlier submission
//! sequence (FIFO within a priority class). `std::collections::BinaryHeap`
//! is a max-heap, so [`Entry`]'s `Ord` impl is written so "greater"
//! means "should run sooner".

use std::collections::BinaryHeap;
use std::sync::Arc;

use super::TaskPriority;

/// Anything a scheduler worker can execute inline.
pub trait Schedulable: Send + Sync {
    fn run(&self);
}

pub(super) struct Entry {
    pub(super) task: Arc<dyn Schedulable>,
    priority: TaskPriority,
    seq: u64,
}

impl Entry {
    pub(super) fn new(task: Arc<dyn Schedulable>, priority: TaskPriority, seq: u64) -> Self {
        Self { task, priority, seq }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher priority first; for equal priority, lower sequence
        // (earlier submission) first — so it must compare as "greater"
        // in this max-heap.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Plain priority queue, no synchronization of its own — callers
/// (the scheduler's worker loop) hold their own mutex around it.
#[derive(Default)]
pub(super) struct PriorityQueue {
    heap: BinaryHeap<Entry>,
}

impl PriorityQueue {
    pub(super) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub(super) fn push(&mut self, entry: Entry) {
        self.heap.push(entry);
    }

    pub(super) fn pop(&mut self) -> Option<Entry> {
        self.heap.pop()
    }

    pub(super) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(super) fn drain(&mut self) -> Vec<Entry> {
        self.heap.drain().collect()
    }
}
