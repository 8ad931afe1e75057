// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint configuration.
//!
//! Compile-time defaults live here as constants; [`EndpointConfig`] carries
//! the per-endpoint values. Socket options and timings can be overridden
//! from the environment with [`EndpointConfig::with_env_overrides`].
//!
//! # Environment Variables
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `UDP_EP_REUSEADDR=0/1` | SO_REUSEADDR on the bound socket |
//! | `UDP_EP_REUSEPORT=0/1` | SO_REUSEPORT on the bound socket (Unix) |
//! | `UDP_EP_RETRY_DELAY_MS=<ms>` | Sleep after a buffer pool miss |
//! | `UDP_EP_RX_POLL_MS=<ms>` | Socket read timeout used to notice `stop()` |
//! | `UDP_EP_RCVBUF=<bytes>` | SO_RCVBUF request |

use crate::dispatch::Backpressure;
use crate::error::{Error, Result};
use std::time::Duration;

/// Pool slots per worker, for both the buffer and the request pool.
pub const DEFAULT_POOL_MULTIPLE: usize = 5;

/// Sleep before retrying after the buffer pool ran dry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Read timeout on the socket; bounds how long `stop()` waits on a quiet socket.
pub const DEFAULT_RX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Ethernet-MTU sized receive buffer.
pub const DEFAULT_READ_BUFFER: usize = 1500;

pub const DEFAULT_WORKERS: usize = 4;

pub const DEFAULT_QUEUE_LEN: usize = 1024;

/// Per-endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Size of each receive buffer (bytes). Longer datagrams are truncated by the OS.
    pub read_buffer: usize,
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of the dispatch queue.
    pub queue_len: usize,
    /// Pool slots per worker.
    pub pool_multiple: usize,
    /// SO_REUSEADDR.
    pub reuse_addr: bool,
    /// SO_REUSEPORT (ignored on non-Unix targets).
    pub reuse_port: bool,
    /// Sleep after a buffer pool miss.
    pub retry_delay: Duration,
    /// Socket read timeout used to poll the running flag.
    pub rx_poll_interval: Duration,
    /// Optional SO_RCVBUF size.
    pub recv_buffer_size: Option<usize>,
    /// What `submit` does when the dispatch queue is full.
    pub backpressure: Backpressure,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new(DEFAULT_READ_BUFFER, DEFAULT_WORKERS, DEFAULT_QUEUE_LEN)
    }
}

impl EndpointConfig {
    /// Configuration with the given sizes and defaults for everything else.
    pub fn new(read_buffer: usize, workers: usize, queue_len: usize) -> Self {
        Self {
            read_buffer,
            workers,
            queue_len,
            pool_multiple: DEFAULT_POOL_MULTIPLE,
            reuse_addr: true,
            reuse_port: true,
            retry_delay: DEFAULT_RETRY_DELAY,
            rx_poll_interval: DEFAULT_RX_POLL_INTERVAL,
            recv_buffer_size: None,
            backpressure: Backpressure::Block,
        }
    }

    #[must_use]
    pub fn with_reuse_addr(mut self, enabled: bool) -> Self {
        self.reuse_addr = enabled;
        self
    }

    #[must_use]
    pub fn with_reuse_port(mut self, enabled: bool) -> Self {
        self.reuse_port = enabled;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_rx_poll_interval(mut self, interval: Duration) -> Self {
        self.rx_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_recv_buffer_size(mut self, bytes: usize) -> Self {
        self.recv_buffer_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    #[must_use]
    pub fn with_pool_multiple(mut self, multiple: usize) -> Self {
        self.pool_multiple = multiple;
        self
    }

    /// Slots in the buffer pool.
    pub fn pool_size(&self) -> usize {
        self.workers.saturating_mul(self.pool_multiple)
    }

    /// Slots in the request pool.
    ///
    /// At most `queue_len` requests wait in the queue, `workers` are being
    /// handled and one is being built by the receive loop, so a pool this
    /// large is never the reason a datagram or an error report is dropped.
    pub fn request_pool_size(&self) -> usize {
        self.pool_size()
            .max(self.queue_len.saturating_add(self.workers).saturating_add(1))
    }

    /// Check sizes and timings.
    ///
    /// A pool smaller than `queue_len + workers` is accepted but logged: under
    /// a full queue the receive loop will hit pool exhaustion and back off.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer == 0 || self.read_buffer > MAX_DATAGRAM_SIZE {
            return Err(Error::InvalidConfig(format!(
                "read_buffer must be 1..={} bytes, got {}",
                MAX_DATAGRAM_SIZE, self.read_buffer
            )));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".to_string()));
        }
        if self.queue_len == 0 {
            return Err(Error::InvalidConfig(
                "queue_len must be at least 1".to_string(),
            ));
        }
        if self.pool_multiple == 0 {
            return Err(Error::InvalidConfig(
                "pool_multiple must be at least 1".to_string(),
            ));
        }
        if self.rx_poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "rx_poll_interval must be non-zero".to_string(),
            ));
        }
        if self.pool_size() < self.queue_len + self.workers {
            log::debug!(
                "[UDP-EP] pool_size={} < queue_len+workers={}: expect buffer pool back-off under load",
                self.pool_size(),
                self.queue_len + self.workers
            );
        }
        Ok(())
    }

    /// Apply `UDP_EP_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (unparseable values are ignored).
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(enabled) = lookup("UDP_EP_REUSEADDR").and_then(|v| parse_flag(&v)) {
            self.reuse_addr = enabled;
        }
        if let Some(enabled) = lookup("UDP_EP_REUSEPORT").and_then(|v| parse_flag(&v)) {
            self.reuse_port = enabled;
        }
        if let Some(ms) = lookup("UDP_EP_RETRY_DELAY_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("UDP_EP_RX_POLL_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.rx_poll_interval = Duration::from_millis(ms);
        }
        if let Some(bytes) = lookup("UDP_EP_RCVBUF").and_then(|v| v.parse::<usize>().ok()) {
            self.recv_buffer_size = Some(bytes);
        }
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
