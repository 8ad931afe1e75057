// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transmit path.
//!
//! Sends go straight to the shared socket from the caller's thread; nothing
//! is queued. `send_to_timeout` runs the send on a helper thread and waits on
//! a one-shot channel, so the caller gets an answer within the deadline even
//! if the kernel blocks.
//!
//! A timed-out send is NOT cancelled. The helper thread still owns a copy of
//! the payload and may complete the send after the caller has seen
//! [`Error::Timeout`].

use crate::error::{Error, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use std::fmt;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Cloneable handle to the endpoint's bound socket for sending.
///
/// Safe to use from any thread, including from inside a receive callback.
#[derive(Clone)]
pub struct Transmitter {
    socket: Arc<UdpSocket>,
}

impl fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transmitter")
            .field("local_addr", &self.socket.local_addr().ok())
            .finish()
    }
}

impl Transmitter {
    pub(crate) fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send `payload` as one datagram to `to`.
    ///
    /// # Errors
    /// - [`Error::Send`] if the socket rejects the datagram
    /// - [`Error::ShortSend`] if fewer bytes than `payload.len()` went out
    pub fn send_to(&self, to: impl Into<SocketAddr>, payload: &[u8]) -> Result<()> {
        send_datagram(&self.socket, to.into(), payload)
    }

    /// Like [`send_to`](Self::send_to), but give up waiting after `timeout`.
    ///
    /// # Errors
    /// - [`Error::Timeout`] if the send did not finish in time (it may still complete later)
    /// - any error [`send_to`](Self::send_to) returns
    pub fn send_to_timeout(
        &self,
        to: impl Into<SocketAddr>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<()> {
        let to = to.into();
        let socket = Arc::clone(&self.socket);
        let payload = payload.to_vec();
        send_with_deadline(move || send_datagram(&socket, to, &payload), timeout)
    }
}

fn send_datagram(socket: &UdpSocket, to: SocketAddr, payload: &[u8]) -> Result<()> {
    let sent = socket.send_to(payload, to).map_err(Error::Send)?;
    if sent != payload.len() {
        return Err(Error::ShortSend {
            sent,
            expected: payload.len(),
        });
    }
    log::trace!("[UDP-EP-TX] sent {} bytes to {}", sent, to);
    Ok(())
}

/// Run `op` on a helper thread and wait at most `timeout` for its result.
pub(crate) fn send_with_deadline<F>(op: F, timeout: Duration) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let (done_tx, done_rx) = channel::bounded::<Result<()>>(1);
    thread::Builder::new()
        .name("udp-ep-tx".to_string())
        .spawn(move || {
            // The waiter may be gone after a timeout; the result is discarded then.
            let _ = done_tx.send(op());
        })?;

    match done_rx.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => {
            log::debug!("[UDP-EP-TX] send timed out after {:?}", timeout);
            Err(Error::Timeout)
        }
        Err(RecvTimeoutError::Disconnected) => Err(Error::Internal("send thread exited without result")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    fn loopback() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").expect("bind should succeed")
    }

    #[test]
    fn test_send_to_delivers_exact_bytes() {
        let receiver = loopback();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set timeout");
        let tx = Transmitter::new(Arc::new(loopback()));

        tx.send_to(receiver.local_addr().expect("local addr"), b"ping")
            .expect("send should succeed");

        let mut buf = [0u8; 16];
        let (n, from) = receiver.recv_from(&mut buf).expect("datagram expected");
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, tx.local_addr().expect("local addr"));
    }

    #[test]
    fn test_send_to_timeout_success() {
        let receiver = loopback();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set timeout");
        let tx = Transmitter::new(Arc::new(loopback()));

        tx.send_to_timeout(
            receiver.local_addr().expect("local addr"),
            b"deadline",
            Duration::from_secs(2),
        )
        .expect("send should finish in time");

        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).expect("datagram expected");
        assert_eq!(&buf[..n], b"deadline");
    }

    #[test]
    fn test_deadline_elapses_before_slow_send() {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = Arc::clone(&finished);

        let started = Instant::now();
        let result = send_with_deadline(
            move || {
                thread::sleep(Duration::from_millis(300));
                finished_clone.store(true, Ordering::SeqCst);
                Ok(())
            },
            Duration::from_millis(20),
        );
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(Error::Timeout)));
        assert!(elapsed >= Duration::from_millis(20), "returned early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(200), "waited for the send: {:?}", elapsed);
        assert!(!finished.load(Ordering::SeqCst), "caller returned before the send");
    }

    #[test]
    fn test_deadline_forwards_send_error() {
        let result = send_with_deadline(
            || Err(Error::ShortSend { sent: 1, expected: 4 }),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(Error::ShortSend { sent: 1, expected: 4 })));
    }

    #[test]
    fn test_transmitter_is_cloneable_across_threads() {
        let receiver = loopback();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set timeout");
        let target = receiver.local_addr().expect("local addr");
        let tx = Transmitter::new(Arc::new(loopback()));

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let tx = tx.clone();
                thread::spawn(move || tx.send_to(target, &[i]))
            })
            .collect();
        for handle in handles {
            handle
                .join()
                .expect("sender thread should not panic")
                .expect("send should succeed");
        }

        let mut seen = Vec::new();
        let mut buf = [0u8; 4];
        for _ in 0..4 {
            let (n, _) = receiver.recv_from(&mut buf).expect("datagram expected");
            assert_eq!(n, 1);
            seen.push(buf[0]);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
