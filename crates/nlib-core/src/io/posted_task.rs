// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cross-thread task posting queue drained each [`super::EventLoop`]
//! iteration (§4.6).

use std::collections::VecDeque;

use crate::sync::Mutex;

type PostedFn = Box<dyn FnOnce() + Send>;

pub(super) struct PostedTaskQueue {
    tasks: Mutex<VecDeque<PostedFn>>,
}

impl PostedTaskQueue {
    pub(super) fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
        }
    }

    pub(super) fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.tasks.lock().push_back(Box::new(task));
    }

    /// Drain and run every task queued since the last drain. Returns
    /// how many ran.
    pub(super) fn drain_and_run(&self) -> usize {
        let drained: Vec<PostedFn> = self.tasks.lock().drain(..).collect();
        let count = drained.len();
        for task in drained {
            task();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn posted_tasks_run_in_fifo_order() {
        let queue = PostedTaskQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            queue.post(move || order.lock().push(i));
        }
        assert_eq!(queue.drain_and_run(), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn drain_is_empty_after_running() {
        let queue = PostedTaskQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        queue.post(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        });
        queue.drain_and_run();
        assert_eq!(queue.drain_and_run(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
