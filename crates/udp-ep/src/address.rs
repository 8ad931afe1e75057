// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Opaque transport addresses.
//!
//! An [`Address`] is what the receive callback gets for the sender of a
//! datagram and what the transmit path accepts as destination. Callers that
//! need the raw parts use [`Address::host_port`] / [`Address::octets_port`]
//! (or the free functions [`addr`] / [`addr_bytes`]).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// IPv4 or IPv6 endpoint (IP bytes + port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(SocketAddr);

/// Raw IP bytes of an [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpOctets {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl IpOctets {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            IpOctets::V4(octets) => octets,
            IpOctets::V6(octets) => octets,
        }
    }
}

impl AsRef<[u8]> for IpOctets {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Address {
    pub const fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// IPv4 address from raw octets.
    pub fn v4(octets: [u8; 4], port: u16) -> Self {
        Self(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
    }

    /// IPv6 address from raw octets.
    pub fn v6(octets: [u8; 16], port: u16) -> Self {
        Self(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
    }

    pub const fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn is_ipv4(&self) -> bool {
        self.0.is_ipv4()
    }

    /// Textual IP and port, e.g. `("10.0.0.1", 9000)` or `("::1", 9000)`.
    pub fn host_port(&self) -> (String, u16) {
        (self.0.ip().to_string(), self.0.port())
    }

    /// Raw IP bytes and port.
    pub fn octets_port(&self) -> (IpOctets, u16) {
        let octets = match self.0.ip() {
            IpAddr::V4(ip) => IpOctets::V4(ip.octets()),
            IpAddr::V6(ip) => IpOctets::V6(ip.octets()),
        };
        (octets, self.0.port())
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl From<Address> for SocketAddr {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl From<&Address> for SocketAddr {
    fn from(addr: &Address) -> Self {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Textual IP and port of `address`.
pub fn addr(address: &Address) -> (String, u16) {
    address.host_port()
}

/// Raw IP bytes and port of `address`.
pub fn addr_bytes(address: &Address) -> (IpOctets, u16) {
    address.octets_port()
}
