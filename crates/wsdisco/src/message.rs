// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network message envelope for a single datagram.

use std::net::SocketAddr;
use std::time::Instant;

/// One UDP datagram plus its addressing.
///
/// Immutable once built, except for [`NetworkMessage::replace_payload`]
/// which the compression decorator uses to swap the bytes in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMessage {
    payload: Vec<u8>,
    src: SocketAddr,
    dst: SocketAddr,
    timestamp: Instant,
}

impl NetworkMessage {
    /// Wrap a payload, stamping it with the current time.
    pub fn new(payload: Vec<u8>, src: SocketAddr, dst: SocketAddr) -> Self {
        Self {
            payload,
            src,
            dst,
            timestamp: Instant::now(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn src(&self) -> SocketAddr {
        self.src
    }

    pub fn dst(&self) -> SocketAddr {
        self.dst
    }

    /// Creation time (receive time for inbound messages).
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Replace the payload, keeping addressing and timestamp.
    pub fn replace_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }
}
