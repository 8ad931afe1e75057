// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity receive buffers.
//!
//! A [`Buffer`] owns `capacity` bytes of storage allocated once at pool
//! creation plus a logical length. The receive loop reads straight into the
//! whole storage and then records the datagram size; readers only ever see
//! the first `len` bytes. Recycling forgets the length without touching the
//! storage, so bytes past `len` are stale and never exposed.

use crate::error::Result;
use crate::pool::SlotPool;

/// Pool of receive buffers.
pub type BufferPool = SlotPool<Buffer>;

/// Reusable datagram buffer.
#[derive(Debug)]
pub struct Buffer {
    data: Box<[u8]>,
    len: usize,
}

impl Buffer {
    /// Allocate a zeroed buffer of `capacity` bytes with no valid content.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Size of the storage in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid bytes (the datagram payload).
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Whole storage, for the receive call to write into.
    ///
    /// Invalidates the current content.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        self.len = 0;
        &mut self.data
    }

    /// Record how many bytes of the storage are valid (clamped to capacity).
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.data.len(), "len {} > capacity", len);
        self.len = len.min(self.data.len());
    }

    /// Forget the content; capacity is retained.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

pub(crate) fn reset_buffer(buffer: &mut Buffer) {
    buffer.clear();
}

/// Create a pool of `count` buffers of `buffer_size` bytes each.
///
/// # Examples
/// ```
/// use udp_ep::buffer::buffer_pool;
///
/// let pool = buffer_pool(16, 1500).expect("Pool creation should succeed");
/// assert_eq!(pool.capacity(), 16);
/// let buffer = pool.acquire().expect("buffer available");
/// assert_eq!(buffer.capacity(), 1500);
/// assert!(buffer.is_empty());
/// ```
pub fn buffer_pool(count: usize, buffer_size: usize) -> Result<BufferPool> {
    SlotPool::new(count, |_| Buffer::with_capacity(buffer_size), reset_buffer)
}
