// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the endpoint, its pools and its transmit path.

use std::fmt;
use std::io;

/// Result type for endpoint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Code passed to the `on_error` callback alongside the error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No receive buffer could be acquired. The receive loop sleeps and retries.
    BufferPool,
    /// The socket receive call failed. The receive loop has terminated.
    Receive,
}

impl ErrorCode {
    /// Stable upper-case label, used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BufferPool => "BUFFER_POOL",
            ErrorCode::Receive => "RECEIVE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while configuring or running an endpoint
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration value rejected by `EndpointConfig::validate`.
    InvalidConfig(String),
    /// Host could not be parsed or resolved to a socket address.
    InvalidAddress(String),

    // ========================================================================
    // Socket Errors
    // ========================================================================
    /// Failed to bind the socket to the requested address.
    Bind {
        /// Address the bind was attempted on.
        addr: String,
        /// Underlying OS error.
        source: io::Error,
    },
    /// Socket receive failed (fatal for the receive loop).
    Receive(io::Error),
    /// Socket send failed.
    Send(io::Error),
    /// Datagram was only partially written.
    ShortSend {
        /// Bytes accepted by the socket.
        sent: usize,
        /// Payload length.
        expected: usize,
    },
    /// Send did not complete before the deadline.
    Timeout,
    /// Other I/O error (socket options, thread spawn).
    Io(io::Error),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Every slot of the pool is in use.
    PoolExhausted,
    /// Dispatch queue is full and the pool drops on saturation.
    QueueFull,
    /// Dispatch pool has been closed.
    DispatchClosed,

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// A receive loop is already active on this endpoint.
    AlreadyRunning,
    /// Operation needs a bound socket.
    NotBound,
    /// Endpoint has been stopped and cannot be restarted.
    Stopped,
    /// Internal invariant violated.
    Internal(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            Error::Bind { addr, source } => write!(f, "Bind to {} failed: {}", addr, source),
            Error::Receive(e) => write!(f, "Receive failed: {}", e),
            Error::Send(e) => write!(f, "Send failed: {}", e),
            Error::ShortSend { sent, expected } => {
                write!(f, "Short send: {} of {} bytes written", sent, expected)
            }
            Error::Timeout => write!(f, "Send deadline exceeded"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::PoolExhausted => write!(f, "Pool exhausted"),
            Error::QueueFull => write!(f, "Dispatch queue full"),
            Error::DispatchClosed => write!(f, "Dispatch pool closed"),
            Error::AlreadyRunning => write!(f, "Receive loop already running"),
            Error::NotBound => write!(f, "Endpoint socket not bound"),
            Error::Stopped => write!(f, "Endpoint stopped"),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { source, .. } => Some(source),
            Error::Receive(e) | Error::Send(e) | Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
