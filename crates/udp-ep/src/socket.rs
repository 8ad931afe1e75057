// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket creation, options and binding.
//!
//! Sockets are built with `socket2` so options can be applied before
//! `bind()`, then converted into a std `UdpSocket` shared (via `Arc`) between
//! the receive loop and the transmit path.

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

/// Resolve `host:port` to a socket address.
///
/// An empty host (or `*`) means the IPv4 wildcard. IP literals are parsed
/// directly; anything else goes through the system resolver and the first
/// result wins.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let host = host.trim();
    if host.is_empty() || host == "*" {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", host, e)))?
        .next()
        .ok_or_else(|| Error::InvalidAddress(format!("{}: no address found", host)))
}

/// Create a UDP socket with the configured options and bind it to `addr`.
///
/// The returned socket has a read timeout of `config.rx_poll_interval`, so a
/// receive call wakes up periodically even on a silent network. That tick is
/// how the receive loop notices `stop()`; the socket is never shut down
/// underneath a blocked receive.
pub fn bind_udp(addr: SocketAddr, config: &EndpointConfig) -> Result<UdpSocket> {
    crate::trace_fn!("socket::bind_udp");
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(config.reuse_addr)?;
    #[cfg(unix)]
    set_reuseport(&socket, config.reuse_port)?;
    if let Some(bytes) = config.recv_buffer_size {
        socket.set_recv_buffer_size(bytes)?;
    }

    socket.bind(&addr.into()).map_err(|source| Error::Bind {
        addr: addr.to_string(),
        source,
    })?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(config.rx_poll_interval))?;

    log::debug!(
        "[UDP-EP] bound addr={} reuse_addr={} reuse_port={} rcvbuf={:?}",
        socket.local_addr().map_or_else(|_| addr.to_string(), |a| a.to_string()),
        config.reuse_addr,
        config.reuse_port,
        config.recv_buffer_size
    );
    Ok(socket)
}

/// Set SO_REUSEPORT on a socket for multi-process port sharing.
///
/// Only available on Unix systems.
#[cfg(unix)]
fn set_reuseport(socket: &Socket, enabled: bool) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    let optval: libc::c_int = libc::c_int::from(enabled);
    // SAFETY: setsockopt FFI with valid fd, standard socket option, and correctly sized optval pointer
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
