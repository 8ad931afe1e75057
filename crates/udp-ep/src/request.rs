// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recyclable request descriptors.
//!
//! A [`Request`] carries one unit of worker work: either a received datagram
//! (sender, buffer, byte count) or an error report (code, error). Requests
//! live in a [`RequestPool`]; the slot identity assigned at pool creation is
//! the request id and never changes.
//!
//! The reset hook returns the request to [`Op::Idle`], which drops any buffer
//! it still references. A buffer therefore never outlives the request that
//! carried it, and a recycled request never points at a buffer.

use crate::address::Address;
use crate::buffer::Buffer;
use crate::error::{Error, ErrorCode, Result};
use crate::pool::{Pooled, SlotPool};
use std::mem;

/// Pool of request descriptors.
pub type RequestPool = SlotPool<Request>;

/// Work carried by a request.
#[derive(Debug, Default)]
pub enum Op {
    /// Sitting in the pool.
    #[default]
    Idle,
    /// A datagram of `len` bytes from `from`, stored in `buffer`.
    Receive {
        from: Address,
        buffer: Pooled<Buffer>,
        len: usize,
    },
    /// An error condition raised by the receive loop.
    Error { code: ErrorCode, error: Error },
}

impl Op {
    /// Label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Idle => "IDLE",
            Op::Receive { .. } => "RECEIVE",
            Op::Error { .. } => "ERROR",
        }
    }
}

/// Identity-tagged descriptor.
#[derive(Debug)]
pub struct Request {
    id: u64,
    op: Op,
}

impl Request {
    pub(crate) fn new(id: u64) -> Self {
        Self { id, op: Op::Idle }
    }

    /// Slot identity, fixed at pool creation.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// True while the request references a receive buffer.
    pub fn has_buffer(&self) -> bool {
        matches!(self.op, Op::Receive { .. })
    }

    pub fn set_receive(&mut self, from: Address, buffer: Pooled<Buffer>, len: usize) {
        debug_assert_eq!(buffer.len(), len, "buffer length and byte count disagree");
        self.op = Op::Receive { from, buffer, len };
    }

    pub fn set_error(&mut self, code: ErrorCode, error: Error) {
        self.op = Op::Error { code, error };
    }

    /// Move the operation out, leaving the request idle.
    pub fn take_op(&mut self) -> Op {
        mem::take(&mut self.op)
    }

    /// Drop the operation (and any buffer it holds).
    pub fn clear(&mut self) {
        self.op = Op::Idle;
    }
}

pub(crate) fn reset_request(request: &mut Request) {
    request.clear();
}

/// Create a pool of `count` request descriptors with ids `0..count`.
pub fn request_pool(count: usize) -> Result<RequestPool> {
    SlotPool::new(count, Request::new, reset_request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::buffer_pool;

    #[test]
    fn test_request_ids_match_slots() {
        let pool = request_pool(4).expect("Pool creation should succeed");
        let held: Vec<_> = (0..4)
            .map(|_| pool.acquire().expect("request available"))
            .collect();
        let mut ids: Vec<u64> = held.iter().map(|request| Request::id(request)).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        for request in &held {
            assert_eq!(Pooled::id(request), Request::id(request));
        }
    }

    #[test]
    fn test_release_clears_buffer_reference() {
        let requests = request_pool(2).expect("Pool creation should succeed");
        let buffers = buffer_pool(2, 64).expect("Pool creation should succeed");

        let mut request = requests.acquire().expect("request available");
        let mut buffer = buffers.acquire().expect("buffer available");
        buffer.storage_mut()[..4].copy_from_slice(b"ping");
        buffer.set_len(4);
        request.set_receive(Address::v4([127, 0, 0, 1], 9000), buffer, 4);
        assert!(request.has_buffer());
        assert_eq!(buffers.available(), 1);

        request.release();

        // Clearing the request returned its buffer.
        assert_eq!(buffers.available(), 2);

        // Every reacquired request starts idle, whatever its previous occupant held.
        let held: Vec<_> = (0..2)
            .map(|_| requests.acquire().expect("request available"))
            .collect();
        for request in &held {
            assert!(!request.has_buffer());
            assert!(matches!(request.op(), Op::Idle));
        }
    }

    #[test]
    fn test_take_op_leaves_request_idle() {
        let requests = request_pool(1).expect("Pool creation should succeed");
        let mut request = requests.acquire().expect("request available");
        request.set_error(ErrorCode::BufferPool, Error::PoolExhausted);

        match request.take_op() {
            Op::Error { code, error } => {
                assert_eq!(code, ErrorCode::BufferPool);
                assert!(matches!(error, Error::PoolExhausted));
            }
            other => panic!("unexpected op {}", other.name()),
        }
        assert!(matches!(request.op(), Op::Idle));
    }
}
