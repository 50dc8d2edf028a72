// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP sockets for the queued transport.

use super::multicast::{get_primary_interface_ip, join_multicast_group};
use super::queued::QueuedTransport;
use crate::config::DiscoveryConfig;
use crate::error::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

impl QueuedTransport<UdpSocket> {
    /// Bind the multicast and unicast sockets described by `config`.
    ///
    /// The multicast socket needs SO_REUSEADDR so several nodes on one host
    /// can share the discovery port; failing to set it is fatal.
    pub fn bind(config: &DiscoveryConfig) -> Result<Self> {
        config.validate()?;

        let iface = match config.interface {
            Some(iface) => iface,
            None => get_primary_interface_ip()
                .map_err(|e| Error::transport_init("select interface", e))?,
        };

        let multicast_socket = bind_multicast(config, iface)?;
        let unicast_socket = bind_unicast(config, iface)?;

        QueuedTransport::from_sockets(
            multicast_socket,
            unicast_socket,
            config.multicast_socket_addr(),
            config.retry,
            config.recv_timeout,
            config.drain_timeout,
        )
    }
}

fn new_socket(context: &str) -> Result<Socket> {
    Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::transport_init(format!("create {} socket", context), e))
}

fn bind_multicast(config: &DiscoveryConfig, iface: Ipv4Addr) -> Result<UdpSocket> {
    let socket = new_socket("multicast")?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::transport_init("SO_REUSEADDR on multicast socket", e))?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.multicast_port);
    socket
        .bind(&SocketAddr::V4(bind_addr).into())
        .map_err(|e| Error::transport_init(format!("bind {}", bind_addr), e))?;
    socket
        .set_read_timeout(Some(config.recv_timeout))
        .map_err(|e| Error::transport_init("multicast read timeout", e))?;

    let socket: UdpSocket = socket.into();
    join_multicast_group(&socket, config.multicast_addr, iface, config.multicast_ttl)
        .map_err(|e| Error::transport_init(format!("join {}", config.multicast_addr), e))?;

    log::debug!(
        "[udp] multicast socket bound to {} (group {})",
        bind_addr,
        config.multicast_addr
    );
    Ok(socket)
}

fn bind_unicast(config: &DiscoveryConfig, iface: Ipv4Addr) -> Result<UdpSocket> {
    let socket = new_socket("unicast")?;
    let bind_addr = SocketAddrV4::new(iface, config.unicast_port);
    socket
        .bind(&SocketAddr::V4(bind_addr).into())
        .map_err(|e| Error::transport_init(format!("bind {}", bind_addr), e))?;
    socket
        .set_read_timeout(Some(config.recv_timeout))
        .map_err(|e| Error::transport_init("unicast read timeout", e))?;

    // Multicast traffic leaves through this socket too.
    socket
        .set_multicast_ttl_v4(config.multicast_ttl)
        .map_err(|e| Error::transport_init("IP_MULTICAST_TTL", e))?;
    socket
        .set_multicast_loop_v4(true)
        .map_err(|e| Error::transport_init("IP_MULTICAST_LOOP", e))?;
    if !iface.is_unspecified() {
        if let Err(e) = socket.set_multicast_if_v4(&iface) {
            log::debug!("[udp] IP_MULTICAST_IF {} failed (non-fatal): {}", iface, e);
        }
    }

    let socket: UdpSocket = socket.into();
    log::debug!(
        "[udp] unicast socket bound to {:?}",
        UdpSocket::local_addr(&socket)
    );
    Ok(socket)
}
