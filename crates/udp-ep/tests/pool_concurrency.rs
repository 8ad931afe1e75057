// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters

//! Slot pool under contention: no slot is ever held twice at once and every
//! slot comes back.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use udp_ep::buffer::buffer_pool;
use udp_ep::{Error, SlotPool};

const THREADS: usize = 8;
const ROUNDS: usize = 2_000;

#[test]
fn test_no_slot_held_twice_under_contention() {
    const CAPACITY: usize = 4;
    let pool = SlotPool::new(CAPACITY, |_| 0u64, |v: &mut u64| *v = 0)
        .expect("Pool creation should succeed");
    let held: Arc<Vec<AtomicBool>> =
        Arc::new((0..CAPACITY).map(|_| AtomicBool::new(false)).collect());
    let acquired = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = pool.clone();
            let held = Arc::clone(&held);
            let acquired = Arc::clone(&acquired);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = fastrand::Rng::with_seed(t as u64);
                let mut checkouts = HashSet::new();
                barrier.wait();
                for _ in 0..ROUNDS {
                    let mut item = match pool.acquire() {
                        Ok(item) => item,
                        Err(Error::PoolExhausted) => {
                            thread::yield_now();
                            continue;
                        }
                        Err(e) => panic!("unexpected acquire error: {}", e),
                    };
                    let slot = item.id() as usize;
                    assert!(
                        !held[slot].swap(true, Ordering::AcqRel),
                        "slot {} handed out while already held",
                        slot
                    );
                    assert_eq!(*item, 0, "reset hook ran before reuse");
                    *item = t as u64 + 1;
                    assert!(
                        checkouts.insert((item.id(), item.generation())),
                        "(slot, generation) repeated"
                    );
                    acquired.fetch_add(1, Ordering::Relaxed);

                    if rng.u8(..4) == 0 {
                        thread::sleep(Duration::from_micros(rng.u64(1..50)));
                    }
                    held[slot].store(false, Ordering::Release);
                    item.release();
                }
                checkouts
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let checkouts = handle.join().expect("worker thread should not panic");
        for key in checkouts {
            assert!(all.insert(key), "checkout {:?} seen by two threads", key);
        }
    }

    println!(
        "acquired={} exhausted={} distinct_checkouts={}",
        acquired.load(Ordering::Relaxed),
        pool.exhausted_count(),
        all.len()
    );
    assert_eq!(all.len() as u64, acquired.load(Ordering::Relaxed));
    assert_eq!(pool.available(), CAPACITY);
}

#[test]
fn test_buffers_cross_threads_and_return() {
    let pool = buffer_pool(16, 128).expect("Pool creation should succeed");
    let (tx, rx) = crossbeam::channel::bounded(16);

    let producer = {
        let pool = pool.clone();
        thread::spawn(move || {
            let mut sent = 0usize;
            while sent < ROUNDS {
                match pool.acquire() {
                    Ok(mut buffer) => {
                        let len = sent % 128;
                        buffer.storage_mut()[..len].fill(len as u8);
                        buffer.set_len(len);
                        tx.send(buffer).expect("consumer alive");
                        sent += 1;
                    }
                    Err(Error::PoolExhausted) => thread::yield_now(),
                    Err(e) => panic!("unexpected acquire error: {}", e),
                }
            }
        })
    };

    let consumer = thread::spawn(move || {
        let mut received = 0usize;
        for buffer in rx.iter() {
            let len = received % 128;
            assert_eq!(buffer.len(), len);
            assert!(buffer.as_slice().iter().all(|b| *b == len as u8));
            buffer.release();
            received += 1;
        }
        received
    });

    producer.join().expect("producer should not panic");
    let received = consumer.join().expect("consumer should not panic");
    assert_eq!(received, ROUNDS);
    assert_eq!(pool.available(), pool.capacity());
}
