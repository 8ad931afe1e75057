// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Function-entry tracing.
//!
//! Everything else in the crate logs through the `log` facade directly
//! (`log::debug!("[UDP-EP] ...")`); the host application picks the backend.
//! `trace_fn!` marks entry of public operations and expands to nothing
//! unless the crate is built with the `trace` feature.
//!
//! ```ignore
//! pub fn bind(&self, host: &str, port: u16) -> Result<SocketAddr> {
//!     crate::trace_fn!("Endpoint::bind");
//!     // ...
//! }
//! ```

/// Log entry of a function at TRACE level (when `trace` feature enabled).
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        $crate::__log::trace!("[udp-ep] -> {}", $fn_name);
    };
}

/// No-op trace macro (when trace feature disabled).
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}
