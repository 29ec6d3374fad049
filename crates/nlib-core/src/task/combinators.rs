// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `WhenAll` / `WhenAny` composition over futures (§4.3).
//!
//! Neither spawns a worker thread per combined future: both attach
//! lightweight continuations to each input and let whichever thread
//! completes the triggering input perform the aggregate resolution.

use std::sync::Arc;

use crate::sync::Mutex;

use super::future::{channel, Future, Outcome, Promise};

/// Complete when every input completes, in argument order. Faults or
/// cancels on the first non-successful input; later inputs still run
/// to completion, they just no longer affect the aggregate outcome.
pub fn when_all<T>(futures: Vec<Future<T>>) -> Future<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let (promise, future) = channel::<Vec<T>>();
    if futures.is_empty() {
        promise.set(Vec::new());
        return future;
    }

    let total = futures.len();
    let remaining = Arc::new(Mutex::new(total));
    let results: Arc<Mutex<Vec<Option<T>>>> = Arc::new(Mutex::new(vec![None; total]));
    let promise: Arc<Mutex<Option<Promise<Vec<T>>>>> = Arc::new(Mutex::new(Some(promise)));

    for (index, input) in futures.into_iter().enumerate() {
        let remaining = remaining.clone();
        let results = results.clone();
        let promise = promise.clone();
        input.on_complete(move |outcome| match outcome {
            Outcome::Completed(value) => {
                results.lock()[index] = Some((**value).clone());
                let mut left = remaining.lock();
                *left -= 1;
                if *left == 0 {
                    if let Some(promise) = promise.lock().take() {
                        let values = std::mem::take(&mut *results.lock())
                            .into_iter()
                            .map(|v| v.expect("all slots filled once remaining reaches zero"))
                            .collect();
                        promise.set(values);
                    }
                }
            }
            Outcome::Cancelled => {
                if let Some(promise) = promise.lock().take() {
                    promise.set_cancelled();
                }
            }
            Outcome::Faulted(error) => {
                if let Some(promise) = promise.lock().take() {
                    promise.set_faulted(error.clone());
                }
            }
        });
    }

    future
}

/// Complete with the outcome of whichever input future reaches a
/// terminal state first.
pub fn when_any<T>(futures: Vec<Future<T>>) -> Future<T>
where
    T: Clone + Send + Sync + 'static,
{
    let (promise, future) = channel::<T>();
    let promise: Arc<Mutex<Option<Promise<T>>>> = Arc::new(Mutex::new(Some(promise)));

    for input in futures {
        let promise = promise.clone();
        input.on_complete(move |outcome| {
            let winner = promise.lock().take();
            let Some(promise) = winner else {
                return;
            };
            match outcome {
                Outcome::Completed(value) => promise.set((**value).clone()),
                Outcome::Cancelled => promise.set_cancelled(),
                Outcome::Faulted(error) => promise.set_faulted(error.clone()),
            }
        });
    }

    future
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::future::channel;

    #[test]
    fn when_all_collects_in_order() {
        let (p0, f0) = channel::<i32>();
        let (p1, f1) = channel::<i32>();
        let combined = when_all(vec![f0, f1]);
        p1.set(2);
        p0.set(1);
        match combined.result() {
            Outcome::Completed(values) => assert_eq!(*values, vec![1, 2]),
            _ => panic!("expected Completed"),
        }
    }

    #[test]
    fn when_all_empty_completes_immediately() {
        let combined: Future<Vec<i32>> = when_all(Vec::new());
        match combined.result() {
            Outcome::Completed(values) => assert!(values.is_empty()),
            _ => panic!("expected Completed"),
        }
    }

    #[test]
    fn when_all_propagates_first_cancellation() {
        let (p0, f0) = channel::<i32>();
        let (_p1, f1) = channel::<i32>();
        let combined = when_all(vec![f0, f1]);
        drop(p0);
        assert!(matches!(combined.result(), Outcome::Cancelled));
    }

    #[test]
    fn when_any_resolves_to_first_completer() {
        let (p0, f0) = channel::<i32>();
        let (p1, f1) = channel::<i32>();
        let combined = when_any(vec![f0, f1]);
        p1.set(9);
        match combined.result() {
            Outcome::Completed(value) => assert_eq!(*value, 9),
            _ => panic!("expected Completed"),
        }
        drop(p0); // late loser, must not panic on double-resolve
    }
}
