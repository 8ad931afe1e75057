// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Worker-side request handling.
//!
//! Registered once with the dispatch pool when the endpoint is built. Runs
//! the user callback for the request's operation, then hands the buffer and
//! the request back to their pools.

use crate::address::Address;
use crate::error::{Error, ErrorCode};
use crate::pool::Pooled;
use crate::request::{Op, Request};
use std::sync::Arc;

/// Receive callback: sender, payload (exactly the datagram bytes), byte count.
pub type ReceiveCallback = dyn Fn(&Address, &[u8], usize) + Send + Sync;

/// Error callback: code and underlying error.
pub type ErrorCallback = dyn Fn(ErrorCode, &Error) + Send + Sync;

/// User callbacks, injected at construction.
#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    pub(crate) on_receive: Option<Arc<ReceiveCallback>>,
    pub(crate) on_error: Option<Arc<ErrorCallback>>,
}

impl Callbacks {
    pub(crate) fn reports_errors(&self) -> bool {
        self.on_error.is_some()
    }

    pub(crate) fn delivers_datagrams(&self) -> bool {
        self.on_receive.is_some()
    }
}

pub(crate) fn handle_request(callbacks: &Callbacks, mut request: Pooled<Request>) {
    match request.take_op() {
        Op::Receive { from, buffer, len } => {
            if let Some(on_receive) = &callbacks.on_receive {
                on_receive(&from, buffer.as_slice(), len);
            }
            buffer.release();
        }
        Op::Error { code, error } => {
            if let Some(on_error) = &callbacks.on_error {
                on_error(code, &error);
            } else {
                log::debug!("[UDP-EP] {} error without callback: {}", code, error);
            }
        }
        Op::Idle => {
            log::warn!("[UDP-EP] idle request {} dispatched", request.id());
        }
    }
    request.release();
}
