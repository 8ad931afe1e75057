// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive loop.
//!
//! ```text
//! loop:
//!   acquire buffer ──fail──> [on_error? dispatch BUFFER_POOL] -> sleep(retry_delay) -> loop
//!        │
//!   recv_from(buffer) ──fail──> release buffer -> [on_error? dispatch RECEIVE] -> exit
//!        │
//!   acquire request -> Receive{from, buffer, n} -> dispatch -> loop
//! ```
//!
//! The loop never calls user code itself; every callback runs on a worker.
//! Read timeouts are idle ticks used to notice `stop()`, not failures, so a
//! stopped endpoint is left within one `rx_poll_interval`. Without a receive
//! callback, datagrams are counted and their buffers recycled on the spot.

use crate::address::Address;
use crate::buffer::Buffer;
use crate::dispatch::WorkerPool;
use crate::error::{Error, ErrorCode, Result};
use crate::metrics::EndpointMetrics;
use crate::pool::{Pooled, SlotPool};
use crate::request::{Request, RequestPool};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Why a receive loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `stop()` was requested.
    Stopped,
    /// The socket receive call failed; a `RECEIVE` error was reported.
    ReceiveFailed,
    /// The dispatch pool was closed underneath the loop.
    DispatchClosed,
}

/// Source of datagrams for the receive loop.
pub(crate) trait DatagramSocket: Send + Sync {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl DatagramSocket for UdpSocket {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }
}

/// Source of receive buffers for the receive loop.
pub(crate) trait BufferSource: Send + Sync {
    fn acquire(&self) -> Result<Pooled<Buffer>>;
}

impl BufferSource for SlotPool<Buffer> {
    fn acquire(&self) -> Result<Pooled<Buffer>> {
        SlotPool::acquire(self)
    }
}

enum Received {
    Datagram(usize, SocketAddr),
    Stopped,
    Failed(io::Error),
}

pub(crate) struct RxLoop<'a, S: ?Sized, B: ?Sized> {
    pub(crate) socket: &'a S,
    pub(crate) buffers: &'a B,
    pub(crate) requests: &'a RequestPool,
    pub(crate) dispatcher: &'a WorkerPool<Pooled<Request>>,
    pub(crate) running: &'a AtomicBool,
    pub(crate) metrics: &'a EndpointMetrics,
    pub(crate) report_errors: bool,
    pub(crate) deliver_datagrams: bool,
    pub(crate) retry_delay: Duration,
}

impl<S, B> RxLoop<'_, S, B>
where
    S: DatagramSocket + ?Sized,
    B: BufferSource + ?Sized,
{
    pub(crate) fn run(&self) -> Termination {
        log::debug!(
            "[UDP-EP-RX] started thread={:?}",
            thread::current().name().unwrap_or("<unnamed>")
        );

        while self.running.load(Ordering::Acquire) {
            let mut buffer = match self.buffers.acquire() {
                Ok(buffer) => buffer,
                Err(err) => {
                    EndpointMetrics::incr(&self.metrics.buffer_exhausted);
                    log::debug!(
                        "[UDP-EP-RX] buffer pool miss err={} retry_in={:?}",
                        err,
                        self.retry_delay
                    );
                    if self.report_errors
                        && self.dispatch_error(ErrorCode::BufferPool, err) == Err(Closed)
                    {
                        return Termination::DispatchClosed;
                    }
                    thread::sleep(self.retry_delay);
                    continue;
                }
            };

            match self.receive_into(&mut buffer) {
                Received::Datagram(len, from) => {
                    buffer.set_len(len);
                    self.metrics.record_datagram(len);
                    if !self.deliver_datagrams {
                        buffer.release();
                        continue;
                    }
                    if self.dispatch_receive(Address::from(from), buffer, len) == Err(Closed) {
                        return Termination::DispatchClosed;
                    }
                }
                Received::Stopped => {
                    buffer.release();
                    break;
                }
                Received::Failed(e) => {
                    buffer.release();
                    EndpointMetrics::incr(&self.metrics.receive_errors);
                    log::error!("[UDP-EP-RX] recv_from failed, receive loop exiting: {}", e);
                    if self.report_errors {
                        let _ = self.dispatch_error(ErrorCode::Receive, Error::Receive(e));
                    }
                    return Termination::ReceiveFailed;
                }
            }
        }

        log::debug!("[UDP-EP-RX] stopped");
        Termination::Stopped
    }

    /// Block until a datagram lands in `buffer`, `stop()` is observed, or the socket fails.
    fn receive_into(&self, buffer: &mut Buffer) -> Received {
        loop {
            match self.socket.recv_from(buffer.storage_mut()) {
                Ok((len, from)) => {
                    if !self.running.load(Ordering::Acquire) {
                        self.metrics.record_datagram(len);
                        EndpointMetrics::incr(&self.metrics.requests_dropped);
                        log::debug!(
                            "[UDP-EP-RX] datagram from {} dropped ({} bytes): stopping",
                            from,
                            len
                        );
                        return Received::Stopped;
                    }
                    return Received::Datagram(len, from);
                }
                Err(e) if is_idle_tick(&e) => {
                    if !self.running.load(Ordering::Acquire) {
                        return Received::Stopped;
                    }
                }
                Err(e) => {
                    if !self.running.load(Ordering::Acquire) {
                        return Received::Stopped;
                    }
                    return Received::Failed(e);
                }
            }
        }
    }

    fn dispatch_receive(
        &self,
        from: Address,
        buffer: Pooled<Buffer>,
        len: usize,
    ) -> std::result::Result<(), Closed> {
        let mut request = match self.requests.acquire() {
            Ok(request) => request,
            Err(err) => {
                // Dropping the buffer returns it to its pool.
                EndpointMetrics::incr(&self.metrics.requests_dropped);
                log::debug!(
                    "[UDP-EP-RX] datagram from {} dropped ({} bytes): request pool {}",
                    from,
                    len,
                    err
                );
                return Ok(());
            }
        };
        request.set_receive(from, buffer, len);
        self.submit(request)
    }

    fn dispatch_error(&self, code: ErrorCode, error: Error) -> std::result::Result<(), Closed> {
        let mut request = match self.requests.acquire() {
            Ok(request) => request,
            Err(err) => {
                EndpointMetrics::incr(&self.metrics.requests_dropped);
                log::warn!(
                    "[UDP-EP-RX] {} report dropped ({}): request pool {}",
                    code,
                    error,
                    err
                );
                return Ok(());
            }
        };
        request.set_error(code, error);
        self.submit(request)
    }

    fn submit(&self, request: Pooled<Request>) -> std::result::Result<(), Closed> {
        match self.dispatcher.submit(request) {
            Ok(()) => {
                EndpointMetrics::incr(&self.metrics.requests_dispatched);
                Ok(())
            }
            Err(Error::DispatchClosed) => {
                EndpointMetrics::incr(&self.metrics.requests_dropped);
                log::debug!("[UDP-EP-RX] dispatch pool closed");
                Err(Closed)
            }
            Err(err) => {
                EndpointMetrics::incr(&self.metrics.requests_dropped);
                log::debug!("[UDP-EP-RX] request dropped: {}", err);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Closed;

fn is_idle_tick(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
