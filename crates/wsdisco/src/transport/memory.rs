// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process datagram fabric.
//!
//! [`MemoryNetwork`] lets several discovery nodes run in one process with
//! the regular queued transport (workers, retry queues, back-off) but
//! without touching the host network. Each attached node gets a unicast
//! address `127.0.0.1:<port>` and a membership in the multicast group.
//! Multicast is looped back to the sender, like `IP_MULTICAST_LOOP`.
//! Datagrams to unknown addresses vanish, like UDP.

use super::queued::QueuedTransport;
use super::socket::DatagramSocket;
use crate::config::DiscoveryConfig;
use crate::error::Result;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

const FIRST_PORT: u16 = 40_000;

type Datagram = (Vec<u8>, SocketAddr);

#[derive(Default)]
struct Fabric {
    next_port: u16,
    next_member: u64,
    unicast: HashMap<SocketAddr, Sender<Datagram>>,
    groups: HashMap<SocketAddr, HashMap<u64, Sender<Datagram>>>,
}

impl Fabric {
    fn deliver(&self, from: SocketAddr, dst: SocketAddr, buf: &[u8]) -> bool {
        if let Some(members) = self.groups.get(&dst) {
            for inbox in members.values() {
                let _ = inbox.send((buf.to_vec(), from));
            }
            return !members.is_empty();
        }
        match self.unicast.get(&dst) {
            Some(inbox) => inbox.send((buf.to_vec(), from)).is_ok(),
            None => false,
        }
    }
}

/// Removes the socket from the fabric once its last handle is dropped.
struct Registration {
    fabric: Arc<Mutex<Fabric>>,
    kind: Membership,
}

enum Membership {
    Unicast(SocketAddr),
    Group(SocketAddr, u64),
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut fabric = self.fabric.lock();
        match self.kind {
            Membership::Unicast(addr) => {
                fabric.unicast.remove(&addr);
            }
            Membership::Group(group, id) => {
                if let Some(members) = fabric.groups.get_mut(&group) {
                    members.remove(&id);
                }
            }
        }
    }
}

/// Shared in-memory network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    fabric: Arc<Mutex<Fabric>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport for one node on this network.
    ///
    /// Uses the multicast group, retry schedule and timeouts of `config`.
    pub fn attach(&self, config: &DiscoveryConfig) -> Result<QueuedTransport<MemorySocket>> {
        config.validate()?;
        let group = config.multicast_socket_addr();
        let (unicast, multicast) = self.open_pair(group, config.recv_timeout);
        QueuedTransport::from_sockets(
            multicast,
            unicast,
            group,
            config.retry,
            config.recv_timeout,
            config.drain_timeout,
        )
    }

    /// Open a unicast socket and a membership of `group`.
    ///
    /// The membership socket sends from the unicast address.
    pub fn open_pair(
        &self,
        group: SocketAddr,
        read_timeout: Duration,
    ) -> (MemorySocket, MemorySocket) {
        let mut fabric = self.fabric.lock();

        if fabric.next_port == 0 {
            fabric.next_port = FIRST_PORT;
        }
        let port = fabric.next_port;
        fabric.next_port = fabric.next_port.wrapping_add(1);
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);

        let (ucast_tx, ucast_rx) = channel::unbounded();
        fabric.unicast.insert(addr, ucast_tx);

        fabric.next_member += 1;
        let member = fabric.next_member;
        let (mcast_tx, mcast_rx) = channel::unbounded();
        fabric
            .groups
            .entry(group)
            .or_default()
            .insert(member, mcast_tx);
        drop(fabric);

        let unicast = MemorySocket {
            addr,
            inbox: ucast_rx,
            read_timeout,
            _registration: Arc::new(Registration {
                fabric: Arc::clone(&self.fabric),
                kind: Membership::Unicast(addr),
            }),
            fabric: Arc::clone(&self.fabric),
        };
        let multicast = MemorySocket {
            addr,
            inbox: mcast_rx,
            read_timeout,
            _registration: Arc::new(Registration {
                fabric: Arc::clone(&self.fabric),
                kind: Membership::Group(group, member),
            }),
            fabric: Arc::clone(&self.fabric),
        };
        (unicast, multicast)
    }

    /// Number of live unicast endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.fabric.lock().unicast.len()
    }
}

/// Socket handle on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemorySocket {
    addr: SocketAddr,
    inbox: Receiver<Datagram>,
    read_timeout: Duration,
    _registration: Arc<Registration>,
    fabric: Arc<Mutex<Fabric>>,
}

impl DatagramSocket for MemorySocket {
    fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        match self.inbox.recv_timeout(self.read_timeout) {
            Ok((payload, from)) => {
                // Truncate like a short UDP read buffer.
                let len = payload.len().min(buf.len());
                buf[..len].copy_from_slice(&payload[..len]);
                Ok((len, from))
            }
            Err(RecvTimeoutError::Timeout) => Err(io::ErrorKind::WouldBlock.into()),
            Err(RecvTimeoutError::Disconnected) => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    fn send_datagram(&self, buf: &[u8], dst: SocketAddr) -> io::Result<usize> {
        if !self.fabric.lock().deliver(self.addr, dst, buf) {
            log::debug!("[transport] memory datagram to {} dropped (no receiver)", dst);
        }
        Ok(buf.len())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.addr)
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(self.clone())
    }
}
