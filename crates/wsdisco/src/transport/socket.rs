// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Minimal datagram socket used by the transport workers.
///
/// Every worker owns its own handle obtained through `try_clone`.
/// A receive timeout must surface as `WouldBlock` or `TimedOut`.
pub trait DatagramSocket: Send + Sync + Sized + 'static {
    fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    fn send_datagram(&self, buf: &[u8], dst: SocketAddr) -> io::Result<usize>;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    fn try_clone(&self) -> io::Result<Self>;
}

impl DatagramSocket for UdpSocket {
    fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf)
    }

    fn send_datagram(&self, buf: &[u8], dst: SocketAddr) -> io::Result<usize> {
        self.send_to(buf, dst)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }

    fn try_clone(&self) -> io::Result<Self> {
        UdpSocket::try_clone(self)
    }
}

/// True for the error kinds a read timeout produces.
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
