// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # udp-ep - pooled UDP datagram endpoint
//!
//! A bound UDP socket whose datagrams (and receive-side error conditions) are
//! handed to a fixed pool of worker threads. Receive buffers and request
//! descriptors are recycled through pre-sized slot pools, so the hot path does
//! not allocate per packet.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use udp_ep::{Endpoint, Result};
//!
//! fn main() -> Result<()> {
//!     let endpoint = Endpoint::builder(1500, 4, 1024)
//!         .on_receive(|from, payload, n| {
//!             println!("{} bytes from {}: {:?}", n, from, payload);
//!         })
//!         .on_error(|code, err| eprintln!("{}: {}", code, err))
//!         .build()?;
//!
//!     // Blocks until `stop()` is called from another thread or the socket fails.
//!     endpoint.start("0.0.0.0", 9000)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! socket --recv_from--> receive loop --submit--> bounded queue --> worker threads
//!            ^               |                                        |
//!            |        SlotPool<Buffer>                        on_receive / on_error
//!            |        SlotPool<Request>  <------- release ------------+
//!      Transmitter (send_to / send_to_timeout)
//! ```
//!
//! ## Modules Overview
//!
//! - [`endpoint`] - receive loop, dispatch handler, transmit path
//! - [`pool`] - generic recyclable slot pool
//! - [`dispatch`] - bounded worker pool
//! - [`config`] - defaults and environment overrides

/// Opaque transport addresses handed to callbacks.
pub mod address;
/// Fixed-capacity receive buffers.
pub mod buffer;
/// Endpoint configuration, defaults and environment overrides.
pub mod config;
/// Fixed worker pool draining one bounded queue.
pub mod dispatch;
/// The UDP endpoint: receive loop, dispatch wiring and transmit path.
pub mod endpoint;
/// Error types and receive-side error codes.
pub mod error;
/// Function-entry tracing (compiled out unless the `trace` feature is on).
pub mod logging;
/// Endpoint counters.
pub mod metrics;
/// Generic recyclable slot pool.
pub mod pool;
/// Recyclable request descriptors.
pub mod request;
/// Socket creation, options and binding.
pub mod socket;

pub use address::{addr, addr_bytes, Address, IpOctets};
pub use buffer::{Buffer, BufferPool};
pub use config::EndpointConfig;
pub use dispatch::{Backpressure, WorkerPool};
pub use endpoint::{Endpoint, EndpointBuilder, Termination, Transmitter};
pub use error::{Error, ErrorCode, Result};
pub use metrics::{EndpointMetrics, MetricsSnapshot};
pub use pool::{Pooled, SlotPool};
pub use request::{Op, Request, RequestPool};

#[doc(hidden)]
pub use log as __log;
