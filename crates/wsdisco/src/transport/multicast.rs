// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast group membership and interface discovery.

use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Join `group` on `iface` (or every usable interface when unspecified).
///
/// Per-interface join failures are non-fatal as long as one join succeeds.
pub fn join_multicast_group(
    socket: &UdpSocket,
    group: Ipv4Addr,
    iface: Ipv4Addr,
    ttl: u32,
) -> io::Result<()> {
    let interfaces = if iface.is_unspecified() {
        get_multicast_interfaces()
    } else {
        vec![iface]
    };

    if interfaces.is_empty() {
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        log::debug!("[udp] join_multicast_v4({}) on UNSPECIFIED", group);
    } else {
        let mut joined = 0usize;
        let mut last_err = None;
        for iface in &interfaces {
            match socket.join_multicast_v4(&group, iface) {
                Ok(()) => {
                    joined += 1;
                    log::debug!("[udp] join_multicast_v4({}) on {}", group, iface);
                }
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    joined += 1;
                    log::debug!("[udp] {} already joined on {}", group, iface);
                }
                Err(e) => {
                    log::debug!(
                        "[udp] join_multicast_v4({}) on {} failed (non-fatal): {}",
                        group,
                        iface,
                        e
                    );
                    last_err = Some(e);
                }
            }
        }
        if joined == 0 {
            return Err(last_err.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no interface joined")
            }));
        }
    }

    socket.set_multicast_loop_v4(true)?;
    socket.set_multicast_ttl_v4(ttl)?;
    Ok(())
}

/// Non-loopback IPv4 interfaces of the host.
///
/// A forced interface comes from [`DiscoveryConfig::interface`] only.
///
/// [`DiscoveryConfig::interface`]: crate::config::DiscoveryConfig::interface
pub fn get_multicast_interfaces() -> Vec<Ipv4Addr> {
    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(ifs) => ifs,
        Err(e) => {
            log::debug!("[udp] failed to list network interfaces: {}", e);
            return Vec::new();
        }
    };

    let addrs: Vec<Ipv4Addr> = interfaces
        .into_iter()
        .filter_map(|(_name, ip)| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
            _ => None,
        })
        .collect();

    log::debug!("[udp] discovered {} non-loopback interfaces", addrs.len());
    addrs
}

/// Address to bind the unicast socket to.
///
/// Falls back to `0.0.0.0` when no interface is usable.
pub fn get_primary_interface_ip() -> io::Result<Ipv4Addr> {
    if let Some(&ip) = get_multicast_interfaces().first() {
        log::debug!("[udp] primary interface {}", ip);
        return Ok(ip);
    }
    log::debug!("[udp] no usable interface, binding UNSPECIFIED");
    Ok(Ipv4Addr::UNSPECIFIED)
}
