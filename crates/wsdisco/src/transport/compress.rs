// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! zlib compression decorator.
//!
//! Deflates every outbound payload (best compression) and inflates every
//! inbound one. A payload that fails to inflate is logged, counted as
//! dropped and never reaches the caller.

use super::{StatsSnapshot, Transport};
use crate::config::MAX_DATAGRAM_SIZE;
use crate::error::{Error, Result};
use crate::message::NetworkMessage;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Largest payload accepted after inflation.
pub const MAX_INFLATED_SIZE: usize = 16 * MAX_DATAGRAM_SIZE;

/// Transport wrapper compressing payloads with zlib.
pub struct CompressedTransport<T: Transport> {
    inner: T,
    inflate_failures: AtomicU64,
}

impl<T: Transport> CompressedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            inflate_failures: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn inflate_message(&self, mut message: NetworkMessage) -> Option<NetworkMessage> {
        match inflate(message.payload()) {
            Ok(payload) => {
                message.replace_payload(payload);
                Some(message)
            }
            Err(e) => {
                self.inflate_failures.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "[transport] dropping datagram from {}: inflate failed: {}",
                    message.src(),
                    e
                );
                None
            }
        }
    }
}

/// Deflate at best compression.
pub fn deflate(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

/// Inflate, refusing output larger than [`MAX_INFLATED_SIZE`].
pub fn inflate(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let limit = MAX_INFLATED_SIZE as u64;
    let mut decoder = ZlibDecoder::new(payload).take(limit + 1);
    let mut out = Vec::with_capacity(payload.len() * 4);
    decoder.read_to_end(&mut out)?;
    if out.len() > MAX_INFLATED_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("inflated payload exceeds {} bytes", MAX_INFLATED_SIZE),
        ));
    }
    Ok(out)
}

impl<T: Transport> Transport for CompressedTransport<T> {
    fn start(&self) -> Result<()> {
        self.inner.start()
    }

    fn send(&self, mut message: NetworkMessage, blocking: bool) -> Result<()> {
        let compressed = deflate(message.payload())
            .map_err(|e| Error::Serialize(format!("deflate: {}", e)))?;
        message.replace_payload(compressed);
        self.inner.send(message, blocking)
    }

    fn recv(&self) -> Option<NetworkMessage> {
        loop {
            let message = self.inner.recv()?;
            if let Some(message) = self.inflate_message(message) {
                return Some(message);
            }
        }
    }

    fn recv_timeout(&self, timeout: Duration) -> Option<NetworkMessage> {
        self.inner
            .recv_timeout(timeout)
            .and_then(|message| self.inflate_message(message))
    }

    fn done(&self) {
        self.inner.done();
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }

    fn multicast_addr(&self) -> SocketAddr {
        self.inner.multicast_addr()
    }

    fn stats(&self) -> StatsSnapshot {
        let mut stats = self.inner.stats();
        stats.datagrams_dropped += self.inflate_failures.load(Ordering::Relaxed);
        stats
    }
}
