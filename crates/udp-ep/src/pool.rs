// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lock-free slot pool for allocation-free object recycling.
//!
//! Pre-allocates N objects, each living in a slot with a stable identity.
//! Free slots are tracked by a lock-free freelist of slot ids; acquiring
//! moves the object out of its slot into an owned [`Pooled`] handle, and
//! releasing (or dropping) the handle runs the pool's reset hook and puts
//! the object back into the same slot.
//!
//! The same pool type backs both receive buffers and request descriptors.
//!
//! # Ownership
//!
//! A [`Pooled<T>`] is the only way to reach an acquired object, and it is
//! not `Clone`. Releasing consumes it, so a slot cannot be handed to two
//! in-flight operations or released twice.
//!
//! # Performance
//!
//! - acquire: one `ArrayQueue::pop` plus one uncontended slot lock
//! - release: reset hook, one uncontended slot lock, one `ArrayQueue::push`

use crate::error::{Error, Result};
use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hook run on every object before it re-enters the freelist.
pub type ResetFn<T> = fn(&mut T);

struct Slot<T> {
    /// `None` while the object is checked out.
    value: Mutex<Option<T>>,
    /// Bumped on every acquire; (id, generation) identifies one checkout.
    generation: AtomicU64,
}

struct Shared<T> {
    slots: Box<[Slot<T>]>,
    freelist: ArrayQueue<usize>,
    reset: ResetFn<T>,
    exhausted_count: AtomicU64,
}

impl<T> Shared<T> {
    fn put_back(&self, id: usize, mut value: T) {
        (self.reset)(&mut value);
        let slot = &self.slots[id];
        {
            let mut guard = slot.value.lock();
            debug_assert!(guard.is_none(), "slot {} released while not checked out", id);
            *guard = Some(value);
        }
        if self.freelist.push(id).is_err() {
            log::error!("[POOL] freelist full on release of slot {}: double release", id);
        }
    }
}

/// Fixed-size pool of recyclable objects.
///
/// Cloning the pool is cheap and yields another handle to the same slots.
///
/// # Examples
/// ```
/// use udp_ep::SlotPool;
///
/// let pool = SlotPool::new(2, |id| (id, Vec::<u8>::with_capacity(64)), |(_, v)| v.clear())
///     .expect("Pool creation should succeed");
///
/// let mut item = pool.acquire().expect("slot available");
/// item.1.extend_from_slice(b"abc");
/// item.release();
///
/// let item = pool.acquire().expect("slot available");
/// assert!(item.1.is_empty());
/// ```
pub struct SlotPool<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SlotPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for SlotPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("exhausted_count", &self.exhausted_count())
            .finish()
    }
}

impl<T> SlotPool<T> {
    /// Create a pool of `capacity` objects.
    ///
    /// `init` receives the slot identity (0..capacity) and builds the object
    /// living in that slot. `reset` runs on every release.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `capacity` is zero.
    pub fn new<F>(capacity: usize, mut init: F, reset: ResetFn<T>) -> Result<Self>
    where
        F: FnMut(u64) -> T,
    {
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "pool capacity must be at least 1".to_string(),
            ));
        }

        let slots: Box<[Slot<T>]> = (0..capacity)
            .map(|id| Slot {
                value: Mutex::new(Some(init(id as u64))),
                generation: AtomicU64::new(0),
            })
            .collect();

        let freelist = ArrayQueue::new(capacity);
        for id in 0..capacity {
            freelist
                .push(id)
                .map_err(|_| Error::Internal("freelist init failed: capacity mismatch"))?;
        }

        Ok(Self {
            shared: Arc::new(Shared {
                slots,
                freelist,
                reset,
                exhausted_count: AtomicU64::new(0),
            }),
        })
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    /// Number of slots currently free.
    pub fn available(&self) -> usize {
        self.shared.freelist.len()
    }

    /// Number of slots currently checked out.
    pub fn in_use(&self) -> usize {
        self.capacity() - self.available()
    }

    /// Number of failed acquisitions since creation (diagnostic).
    pub fn exhausted_count(&self) -> u64 {
        self.shared.exhausted_count.load(Ordering::Relaxed)
    }

    /// Check out a free slot.
    ///
    /// Never grows the pool.
    ///
    /// # Errors
    /// Returns [`Error::PoolExhausted`] when every slot is in use.
    pub fn acquire(&self) -> Result<Pooled<T>> {
        let Some(id) = self.shared.freelist.pop() else {
            self.shared.exhausted_count.fetch_add(1, Ordering::Relaxed);
            return Err(Error::PoolExhausted);
        };

        let slot = &self.shared.slots[id];
        let Some(value) = slot.value.lock().take() else {
            // The id was on the freelist, so the slot must hold its object.
            log::error!("[POOL] slot {} on freelist but empty", id);
            return Err(Error::Internal("free slot without object"));
        };
        let generation = slot.generation.fetch_add(1, Ordering::AcqRel) + 1;

        Ok(Pooled {
            id,
            generation,
            value: ManuallyDrop::new(value),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Return an object to its slot.
    ///
    /// Equivalent to `item.release()`; the object always returns to the pool
    /// it was acquired from.
    pub fn release(&self, item: Pooled<T>) {
        debug_assert!(
            Arc::ptr_eq(&self.shared, &item.shared),
            "object released to a foreign pool"
        );
        item.release();
    }
}

/// An object checked out of a [`SlotPool`].
///
/// Dereferences to the object. Dropping it returns the object to its slot,
/// after the pool's reset hook has run.
pub struct Pooled<T> {
    id: usize,
    generation: u64,
    value: ManuallyDrop<T>,
    shared: Arc<Shared<T>>,
}

impl<T> Pooled<T> {
    /// Stable identity of the slot this object belongs to.
    pub fn id(&self) -> u64 {
        self.id as u64
    }

    /// Checkout counter of the slot at acquisition time.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reset the object and return it to its slot.
    pub fn release(self) {
        drop(self);
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        // SAFETY: `value` is initialized from construction until here and is
        // never accessed again after being taken.
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        self.shared.put_back(self.id, value);
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("value", &*self.value)
            .finish()
    }
}
