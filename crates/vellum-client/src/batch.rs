//! Batch processor: fixed-size chunking and capped concurrent dispatch.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::config::DEFAULT_MAX_CONCURRENCY;

/// Split items into contiguous fixed-size slices; the final slice may be
/// smaller.
pub fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter();
    loop {
        let batch: Vec<T> = iter.by_ref().take(size).collect();
        if batch.is_empty() {
            break;
        }
        batches.push(batch);
    }
    batches
}

/// Decision returned by the per-completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchControl {
    /// Keep admitting queued batches.
    Continue,
    /// Stop admitting new batches; in-flight batches run to completion.
    Drain,
}

/// Runs batches through a worker under a concurrency cap.
///
/// Batches are dispatched in order but may complete out of order; the
/// cap bounds concurrent work, not completion order. The processor never
/// retries and never swallows results — propagation policy belongs to
/// the caller's completion callback.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    max_concurrency: usize,
}

impl BatchProcessor {
    /// Create a processor with the given concurrency cap.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Process every batch, invoking `on_batch` once per completion with
    /// the batch index and the worker's output. Returning
    /// [`BatchControl::Drain`] stops further admissions while letting
    /// in-flight batches finish (their completions are still delivered).
    pub async fn process<T, R, F, Fut, C>(&self, batches: Vec<Vec<T>>, worker: F, mut on_batch: C)
    where
        F: Fn(usize, Vec<T>) -> Fut,
        Fut: Future<Output = R>,
        C: FnMut(usize, R) -> BatchControl,
    {
        let mut queue = batches.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut draining = false;

        loop {
            while !draining && in_flight.len() < self.max_concurrency {
                match queue.next() {
                    Some((index, batch)) => {
                        let work = worker(index, batch);
                        in_flight.push(async move { (index, work.await) });
                    }
                    None => break,
                }
            }

            match in_flight.next().await {
                Some((index, result)) => {
                    if on_batch(index, result) == BatchControl::Drain {
                        draining = true;
                    }
                }
                None => break,
            }
        }
    }
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}
