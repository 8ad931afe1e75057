// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP endpoint.
//!
//! # Lifecycle
//!
//! ```text
//! builder().build() --> bind(host, port) --> run() ...blocks... --> Termination
//!                   \__________ start(host, port) __________/
//!
//! stop() (any thread): release socket -> receive loop exits on its next poll tick
//!                      close dispatch queue -> workers drain accepted work -> joined
//! ```
//!
//! An endpoint is single-use: once `stop()` has been called it cannot be
//! bound or run again. A receive loop that ends on a socket failure unbinds
//! the endpoint; a fresh `start()` (or `bind()` + `run()`) resumes receiving
//! on a new socket.

mod handler;
mod rx;
mod tx;

pub use handler::{ErrorCallback, ReceiveCallback};
pub use rx::Termination;
pub use tx::Transmitter;

use crate::address::Address;
use crate::buffer::{buffer_pool, BufferPool};
use crate::config::EndpointConfig;
use crate::dispatch::WorkerPool;
use crate::error::{Error, ErrorCode, Result};
use crate::metrics::{EndpointMetrics, MetricsSnapshot};
use crate::pool::Pooled;
use crate::request::{request_pool, Request, RequestPool};
use crate::socket;
use arc_swap::ArcSwapOption;
use handler::{handle_request, Callbacks};
use rx::RxLoop;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`Endpoint`].
pub struct EndpointBuilder {
    config: EndpointConfig,
    callbacks: Callbacks,
}

impl EndpointBuilder {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            callbacks: Callbacks::default(),
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply `UDP_EP_*` environment overrides to the current configuration.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.config = self.config.with_env_overrides();
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn reuse_addr(mut self, enabled: bool) -> Self {
        self.config.reuse_addr = enabled;
        self
    }

    #[must_use]
    pub fn reuse_port(mut self, enabled: bool) -> Self {
        self.config.reuse_port = enabled;
        self
    }

    /// Callback for every received datagram: `(from, payload, byte_count)`.
    ///
    /// Runs on a worker thread. `payload` is only valid for the duration of
    /// the call; copy it to keep it.
    #[must_use]
    pub fn on_receive<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Address, &[u8], usize) + Send + Sync + 'static,
    {
        self.callbacks.on_receive = Some(Arc::new(callback));
        self
    }

    /// Callback for receive-side failures: buffer pool exhaustion and the
    /// fatal receive error. Without it those are only counted and logged.
    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(ErrorCode, &Error) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(callback));
        self
    }

    /// Validate the configuration, pre-size the pools and start the workers.
    ///
    /// # Errors
    /// - [`Error::InvalidConfig`] for zero or out-of-range sizes
    /// - [`Error::Io`] if a worker thread cannot be spawned
    pub fn build(self) -> Result<Endpoint> {
        crate::trace_fn!("EndpointBuilder::build");
        let EndpointBuilder { config, callbacks } = self;
        config.validate()?;

        let pool_size = config.pool_size();
        let buffers = buffer_pool(pool_size, config.read_buffer)?;
        let requests = request_pool(config.request_pool_size())?;

        let worker_callbacks = callbacks.clone();
        let dispatcher = WorkerPool::new(
            "udp-ep-worker",
            config.workers,
            config.queue_len,
            config.backpressure,
            move |request: Pooled<Request>| handle_request(&worker_callbacks, request),
        )?;

        log::info!(
            "[UDP-EP] endpoint created read_buffer={} workers={} queue_len={} buffers={} requests={}",
            config.read_buffer,
            config.workers,
            config.queue_len,
            pool_size,
            requests.capacity()
        );

        Ok(Endpoint {
            config,
            buffers,
            requests,
            dispatcher,
            callbacks,
            socket: ArcSwapOption::empty(),
            active: AtomicBool::new(true),
            receiving: AtomicBool::new(false),
            metrics: EndpointMetrics::new(),
        })
    }
}

/// A UDP socket whose datagrams are handled by a pool of worker threads.
pub struct Endpoint {
    config: EndpointConfig,
    buffers: BufferPool,
    requests: RequestPool,
    dispatcher: WorkerPool<Pooled<Request>>,
    callbacks: Callbacks,
    socket: ArcSwapOption<UdpSocket>,
    /// Cleared exactly once, by `stop()`.
    active: AtomicBool,
    /// Set while a receive loop is running.
    receiving: AtomicBool,
    metrics: Arc<EndpointMetrics>,
}

impl Endpoint {
    /// Builder with the given buffer size, worker count and queue length.
    pub fn builder(read_buffer: usize, workers: usize, queue_len: usize) -> EndpointBuilder {
        EndpointBuilder::new(EndpointConfig::new(read_buffer, workers, queue_len))
    }

    /// Endpoint without callbacks.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        EndpointBuilder::new(config).build()
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffers
    }

    pub fn request_pool(&self) -> &RequestPool {
        &self.requests
    }

    /// Receive-side and dispatch counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        let dispatch = self.dispatcher.snapshot();
        MetricsSnapshot {
            requests_processed: dispatch.processed,
            callback_panics: dispatch.panicked,
            ..self.metrics.snapshot()
        }
    }

    /// Address the socket is bound to (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let socket = self.socket.load_full().ok_or(Error::NotBound)?;
        Ok(socket.local_addr()?)
    }

    /// Whether a receive loop is currently running.
    pub fn is_running(&self) -> bool {
        self.receiving.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }

    /// Open and bind the socket.
    ///
    /// # Errors
    /// - [`Error::Stopped`] after [`stop`](Self::stop)
    /// - [`Error::AlreadyRunning`] if the endpoint is already bound
    /// - [`Error::InvalidAddress`] if `host` does not resolve
    /// - [`Error::Bind`] if the address cannot be bound
    pub fn bind(&self, host: &str, port: u16) -> Result<SocketAddr> {
        crate::trace_fn!("Endpoint::bind");
        if self.is_stopped() {
            return Err(Error::Stopped);
        }
        if self.socket.load().is_some() {
            return Err(Error::AlreadyRunning);
        }

        let addr = socket::resolve(host, port)?;
        let socket = Arc::new(socket::bind_udp(addr, &self.config)?);
        let local = socket.local_addr()?;

        let previous = self.socket.compare_and_swap(&None::<Arc<UdpSocket>>, Some(socket));
        if previous.is_some() {
            return Err(Error::AlreadyRunning);
        }
        // stop() may have run between the check above and the swap.
        if self.is_stopped() {
            self.release_socket();
            return Err(Error::Stopped);
        }

        log::info!("[UDP-EP] listening on {}", local);
        Ok(local)
    }

    /// Run the receive loop on the calling thread until `stop()` or a fatal
    /// receive error. After a fatal error the socket is released and the
    /// endpoint must be bound again.
    ///
    /// # Errors
    /// - [`Error::Stopped`] after [`stop`](Self::stop)
    /// - [`Error::NotBound`] without a prior [`bind`](Self::bind)
    /// - [`Error::AlreadyRunning`] if another thread is running the loop
    pub fn run(&self) -> Result<Termination> {
        crate::trace_fn!("Endpoint::run");
        if self.is_stopped() {
            return Err(Error::Stopped);
        }
        let socket = self.socket.load_full().ok_or(Error::NotBound)?;
        if self
            .receiving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        let exit = RxLoop {
            socket: &*socket,
            buffers: &self.buffers,
            requests: &self.requests,
            dispatcher: &self.dispatcher,
            running: &self.active,
            metrics: &self.metrics,
            report_errors: self.callbacks.reports_errors(),
            deliver_datagrams: self.callbacks.delivers_datagrams(),
            retry_delay: self.config.retry_delay,
        }
        .run();

        if exit == Termination::ReceiveFailed {
            // Only unbind if the slot still holds the socket that failed.
            self.socket.compare_and_swap(&socket, None::<Arc<UdpSocket>>);
        }
        self.receiving.store(false, Ordering::Release);
        log::info!("[UDP-EP] receive loop ended: {:?}", exit);
        Ok(exit)
    }

    /// [`bind`](Self::bind) then [`run`](Self::run).
    pub fn start(&self, host: &str, port: u16) -> Result<Termination> {
        self.bind(host, port)?;
        self.run()
    }

    /// Release the socket, then close the dispatch queue and wait for the
    /// workers to finish every request already accepted.
    ///
    /// A running receive loop notices within one `rx_poll_interval` and
    /// returns [`Termination::Stopped`]; the socket closes when it does.
    ///
    /// Idempotent. Safe to call from any thread, including a callback (the
    /// calling worker is then not joined).
    pub fn stop(&self) {
        crate::trace_fn!("Endpoint::stop");
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        log::info!("[UDP-EP] stopping");
        self.release_socket();
        self.dispatcher.close();
        log::debug!(
            "[UDP-EP] stopped buffers_free={}/{} requests_free={}/{}",
            self.buffers.available(),
            self.buffers.capacity(),
            self.requests.available(),
            self.requests.capacity()
        );
    }

    fn release_socket(&self) {
        if let Some(socket) = self.socket.swap(None) {
            log::debug!(
                "[UDP-EP] socket released addr={:?}",
                socket.local_addr().ok()
            );
        }
    }

    /// Cloneable send handle sharing the bound socket.
    ///
    /// # Errors
    /// [`Error::NotBound`] or [`Error::Stopped`] when there is no socket.
    pub fn transmitter(&self) -> Result<Transmitter> {
        self.bound_socket().map(Transmitter::new)
    }

    /// Send `payload` as one datagram to `to` from the bound socket.
    pub fn send_to(&self, to: impl Into<SocketAddr>, payload: &[u8]) -> Result<()> {
        self.transmitter()?.send_to(to, payload)
    }

    /// Send with a deadline; see [`Transmitter::send_to_timeout`].
    pub fn send_to_timeout(
        &self,
        to: impl Into<SocketAddr>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<()> {
        self.transmitter()?.send_to_timeout(to, payload, timeout)
    }

    fn bound_socket(&self) -> Result<Arc<UdpSocket>> {
        match self.socket.load_full() {
            Some(socket) => Ok(socket),
            None if self.is_stopped() => Err(Error::Stopped),
            None => Err(Error::NotBound),
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr().ok())
            .field("running", &self.is_running())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Backpressure;

    fn fast_config() -> EndpointConfig {
        EndpointConfig::new(256, 2, 16)
            .with_rx_poll_interval(Duration::from_millis(20))
            .with_retry_delay(Duration::from_millis(5))
    }

    #[test]
    fn test_pools_sized_from_workers() {
        let endpoint = Endpoint::new(EndpointConfig::new(512, 3, 8)).expect("endpoint should build");
        assert_eq!(endpoint.buffer_pool().capacity(), 15);
        assert_eq!(endpoint.request_pool().capacity(), 15);
        assert!(!endpoint.is_running());
    }

    #[test]
    fn test_request_pool_covers_queue_and_workers() {
        // Two buffers, but error reports must still find a descriptor while
        // both are held by busy workers.
        let config = EndpointConfig::new(512, 2, 64).with_pool_multiple(1);
        let endpoint = Endpoint::new(config).expect("endpoint should build");
        assert_eq!(endpoint.buffer_pool().capacity(), 2);
        assert_eq!(endpoint.request_pool().capacity(), 64 + 2 + 1);
    }

    #[test]
    fn test_env_overrides_keep_builder_settings() {
        let builder = Endpoint::builder(512, 3, 8)
            .config(fast_config().with_backpressure(Backpressure::Drop))
            .with_env_overrides();
        // Only the UDP_EP_* knobs can change; sizing and policy stay put.
        assert_eq!(builder.config.read_buffer, 256);
        assert_eq!(builder.config.workers, 2);
        assert_eq!(builder.config.queue_len, 16);
        assert_eq!(builder.config.backpressure, Backpressure::Drop);
        let endpoint = builder.build().expect("endpoint should build");
        assert_eq!(endpoint.buffer_pool().capacity(), 10);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Endpoint::builder(0, 1, 1).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_run_and_send_need_bind() {
        let endpoint = Endpoint::new(fast_config()).expect("endpoint should build");
        assert!(matches!(endpoint.run(), Err(Error::NotBound)));
        assert!(matches!(endpoint.local_addr(), Err(Error::NotBound)));
        let target: SocketAddr = "127.0.0.1:9".parse().expect("valid literal");
        assert!(matches!(endpoint.send_to(target, b"x"), Err(Error::NotBound)));
    }

    #[test]
    fn test_second_bind_rejected() {
        let endpoint = Endpoint::new(fast_config()).expect("endpoint should build");
        endpoint.bind("127.0.0.1", 0).expect("bind should succeed");
        assert!(matches!(
            endpoint.bind("127.0.0.1", 0),
            Err(Error::AlreadyRunning)
        ));
    }

    #[test]
    fn test_stop_is_final_and_idempotent() {
        let endpoint = Endpoint::new(fast_config()).expect("endpoint should build");
        endpoint.bind("127.0.0.1", 0).expect("bind should succeed");
        endpoint.stop();
        endpoint.stop();

        assert!(endpoint.is_stopped());
        assert!(matches!(endpoint.local_addr(), Err(Error::NotBound)));
        assert!(matches!(endpoint.run(), Err(Error::Stopped)));
        assert!(matches!(endpoint.bind("127.0.0.1", 0), Err(Error::Stopped)));
        assert!(matches!(endpoint.transmitter(), Err(Error::Stopped)));
    }
}
