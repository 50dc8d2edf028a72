// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram transports.
//!
//! # Architecture
//!
//! ```text
//!  send() -> RetryQueue (multicast) -> [wsd-mcast-tx] -> socket -> group
//!         \> RetryQueue (unicast)   -> [wsd-ucast-tx] -> socket -> peer
//!
//!  group -> [wsd-mcast-rx] \
//!                           +-> inbound channel -> recv()/recv_timeout()
//!  peer  -> [wsd-ucast-rx] /
//! ```
//!
//! [`QueuedTransport`] implements this over any [`DatagramSocket`]: real
//! UDP sockets ([`QueuedTransport::bind`]) or the in-process
//! [`MemoryNetwork`]. [`CompressedTransport`] wraps either with zlib.

mod compress;
mod memory;
mod multicast;
mod queued;
mod retry;
mod socket;
mod udp;
mod worker;

pub use compress::{CompressedTransport, MAX_INFLATED_SIZE};
pub use memory::{MemoryNetwork, MemorySocket};
pub use multicast::{get_multicast_interfaces, get_primary_interface_ip};
pub use queued::QueuedTransport;
pub use retry::{Clock, RetryEnvelope, RetryQueue, SystemClock};
pub use socket::DatagramSocket;

use crate::error::Result;
use crate::message::NetworkMessage;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Datagram transport used by the dispatch engine.
pub trait Transport: Send + Sync {
    /// Start the workers. Returns once all of them are running.
    fn start(&self) -> Result<()>;

    /// Queue `message` for transmission with retransmissions.
    ///
    /// Multicast iff the destination is the transport's multicast address.
    /// With `blocking`, returns once the relevant queue has drained.
    fn send(&self, message: NetworkMessage, blocking: bool) -> Result<()>;

    /// Wait for the next inbound datagram; `None` once stopped.
    fn recv(&self) -> Option<NetworkMessage>;

    /// Wait at most `timeout`; `None` on timeout.
    fn recv_timeout(&self, timeout: Duration) -> Option<NetworkMessage>;

    /// Drain outbound queues, stop and join the workers.
    fn done(&self);

    fn is_running(&self) -> bool;

    /// Unicast address peers reply to.
    fn local_addr(&self) -> SocketAddr;

    fn multicast_addr(&self) -> SocketAddr;

    fn stats(&self) -> StatsSnapshot;
}

/// Transport counters (relaxed atomics, diagnostics only).
#[derive(Debug, Default)]
pub struct TransportStats {
    pub datagrams_sent: AtomicU64,
    pub datagrams_received: AtomicU64,
    pub datagrams_dropped: AtomicU64,
}

impl TransportStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_sent(&self) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`TransportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub datagrams_dropped: u64,
}
