// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint counters for diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receive-side counters, updated by the receive loop and the workers.
#[derive(Debug, Default)]
pub struct EndpointMetrics {
    /// Datagrams read from the socket
    pub datagrams_received: AtomicU64,
    /// Payload bytes read from the socket
    pub bytes_received: AtomicU64,
    /// Receive iterations that found the buffer pool empty
    pub buffer_exhausted: AtomicU64,
    /// Fatal receive errors
    pub receive_errors: AtomicU64,
    /// Requests not dispatched (request pool empty, queue full or closed)
    pub requests_dropped: AtomicU64,
    /// Requests handed to the dispatch pool
    pub requests_dispatched: AtomicU64,
}

/// Point-in-time copy of [`EndpointMetrics`] plus dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub buffer_exhausted: u64,
    pub receive_errors: u64,
    pub requests_dropped: u64,
    pub requests_dispatched: u64,
    /// Requests fully handled by a worker
    pub requests_processed: u64,
    /// Callbacks that panicked (caught by the worker)
    pub callback_panics: u64,
}

impl EndpointMetrics {
    pub(crate) fn new() -> Arc<Self> {
        crate::trace_fn!("EndpointMetrics::new");
        Arc::new(Self::default())
    }

    pub(crate) fn record_datagram(&self, len: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of the receive-side counters (dispatch counters left at 0)
    pub fn snapshot(&self) -> MetricsSnapshot {
        crate::trace_fn!("EndpointMetrics::snapshot");
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            buffer_exhausted: self.buffer_exhausted.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            requests_dropped: self.requests_dropped.load(Ordering::Relaxed),
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            requests_processed: 0,
            callback_panics: 0,
        }
    }
}
