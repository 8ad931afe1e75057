// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed worker pool draining one bounded queue.
//!
//! ```text
//! submit(item) --> crossbeam::bounded(queue_len) --> worker-0 --> handler(item)
//!                                                --> worker-1 --> handler(item)
//!                                                --> ...
//! ```
//!
//! All workers share one queue, so items submitted in order A, B may be
//! handled out of order (or concurrently) when two workers are idle.
//! A panicking handler is caught and counted; the worker keeps running.
//!
//! Closing drops the sending side and joins the workers. Workers only exit
//! once the queue is empty, so every accepted item is handled.

use crate::error::{Error, Result};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Behavior of [`WorkerPool::submit`] when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backpressure {
    /// Block the submitter until a worker frees a queue slot.
    #[default]
    Block,
    /// Reject the item with [`Error::QueueFull`].
    Drop,
}

#[derive(Debug, Default)]
struct DispatchCounters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    processed: AtomicU64,
    panicked: AtomicU64,
}

/// Point-in-time copy of the dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub processed: u64,
    pub panicked: u64,
}

/// N worker threads running one handler over a bounded queue.
pub struct WorkerPool<T: Send + 'static> {
    sender: Mutex<Option<Sender<T>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    workers: usize,
    queue_len: usize,
    backpressure: Backpressure,
    counters: Arc<DispatchCounters>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `workers` threads named `{name}-{index}`.
    ///
    /// # Errors
    /// - [`Error::InvalidConfig`] if `workers` or `queue_len` is zero
    /// - [`Error::Io`] if a thread cannot be spawned (already spawned workers are shut down)
    pub fn new<F>(
        name: &str,
        workers: usize,
        queue_len: usize,
        backpressure: Backpressure,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        crate::trace_fn!("WorkerPool::new");
        if workers == 0 || queue_len == 0 {
            return Err(Error::InvalidConfig(format!(
                "worker pool needs workers >= 1 and queue_len >= 1 (got {} / {})",
                workers, queue_len
            )));
        }

        let (sender, receiver) = channel::bounded::<T>(queue_len);
        let handler = Arc::new(handler);
        let counters = Arc::new(DispatchCounters::default());

        let pool = Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(Vec::with_capacity(workers)),
            workers,
            queue_len,
            backpressure,
            counters,
        };

        for index in 0..workers {
            let receiver = receiver.clone();
            let handler = Arc::clone(&handler);
            let counters = Arc::clone(&pool.counters);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || Self::run_worker(&receiver, &*handler, &counters));
            match spawned {
                Ok(handle) => pool.handles.lock().push(handle),
                Err(e) => {
                    log::error!("[DISPATCH] failed to spawn worker {}-{}: {}", name, index, e);
                    pool.close();
                    return Err(Error::Io(e));
                }
            }
        }

        log::debug!(
            "[DISPATCH] pool '{}' started workers={} queue_len={} backpressure={:?}",
            name,
            workers,
            queue_len,
            backpressure
        );
        Ok(pool)
    }

    /// Worker loop: runs until the queue is closed and drained.
    fn run_worker<F>(receiver: &Receiver<T>, handler: &F, counters: &DispatchCounters)
    where
        F: Fn(T) + ?Sized,
    {
        for item in receiver.iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(item))).is_err() {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "[DISPATCH] handler panicked on {:?}",
                    thread::current().name().unwrap_or("<worker>")
                );
            }
            counters.processed.fetch_add(1, Ordering::Relaxed);
        }
        log::debug!(
            "[DISPATCH] {} exiting",
            thread::current().name().unwrap_or("<worker>")
        );
    }

    /// Queue an item for a worker.
    ///
    /// With [`Backpressure::Block`] this waits while the queue is full.
    /// A rejected item is dropped.
    ///
    /// # Errors
    /// - [`Error::QueueFull`] with [`Backpressure::Drop`] and a full queue
    /// - [`Error::DispatchClosed`] after [`close`](Self::close)
    pub fn submit(&self, item: T) -> Result<()> {
        // Clone so a blocked send does not hold the lock `close()` needs.
        let Some(sender) = self.sender.lock().clone() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(Error::DispatchClosed);
        };

        let outcome = match self.backpressure {
            Backpressure::Block => sender.send(item).map_err(|_| Error::DispatchClosed),
            Backpressure::Drop => sender.try_send(item).map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull,
                TrySendError::Disconnected(_) => Error::DispatchClosed,
            }),
        };

        match outcome {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Stop accepting items, let the workers drain the queue, and join them.
    ///
    /// Idempotent. When called from one of the pool's own workers, that
    /// worker is left to finish on its own instead of being joined.
    pub fn close(&self) {
        crate::trace_fn!("WorkerPool::close");
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                log::error!("[DISPATCH] worker thread panicked outside handler");
            }
        }
        log::debug!("[DISPATCH] pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Items waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.lock().as_ref().map_or(0, Sender::len)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len
    }

    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_all_items_processed_before_close_returns() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        let pool = WorkerPool::new("test-worker", 4, 16, Backpressure::Block, move |n: usize| {
            seen_clone.fetch_add(n, Ordering::Relaxed);
        })
        .expect("pool should start");

        for _ in 0..100 {
            pool.submit(1).expect("submit should succeed");
        }
        pool.close();

        assert_eq!(seen.load(Ordering::Relaxed), 100);
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.submitted, 100);
        assert_eq!(snapshot.processed, 100);
        assert!(pool.is_closed());
    }

    #[test]
    fn test_submit_after_close_rejected() {
        let pool = WorkerPool::new("test-closed", 1, 1, Backpressure::Block, |_: u8| {})
            .expect("pool should start");
        pool.close();
        pool.close();
        assert!(matches!(pool.submit(1), Err(Error::DispatchClosed)));
        assert_eq!(pool.snapshot().rejected, 1);
    }

    #[test]
    fn test_drop_policy_rejects_when_full() {
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(1);
        let pool = WorkerPool::new("test-drop", 1, 1, Backpressure::Drop, move |_: u8| {
            let _ = started_tx.try_send(());
            let _ = gate_rx.recv();
        })
        .expect("pool should start");

        // First item occupies the single worker.
        pool.submit(0).expect("first submit should succeed");
        started_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker should pick up the first item");

        // Second fills the queue, third is rejected.
        pool.submit(1).expect("second submit should fill the queue");
        assert!(matches!(pool.submit(2), Err(Error::QueueFull)));
        assert_eq!(pool.queued(), 1);

        drop(gate_tx);
        pool.close();
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.submitted, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.processed, 2);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        let pool = WorkerPool::new("test-panic", 1, 8, Backpressure::Block, move |n: u32| {
            if n == 0 {
                panic!("boom");
            }
            seen_clone.fetch_add(1, Ordering::Relaxed);
        })
        .expect("pool should start");

        pool.submit(0).expect("submit should succeed");
        pool.submit(1).expect("submit should succeed");
        pool.submit(2).expect("submit should succeed");
        pool.close();

        assert_eq!(seen.load(Ordering::Relaxed), 2);
        assert_eq!(pool.snapshot().panicked, 1);
        assert_eq!(pool.snapshot().processed, 3);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = WorkerPool::new("test-zero", 0, 1, Backpressure::Block, |_: u8| {});
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
