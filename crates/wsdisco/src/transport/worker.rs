// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver and sender worker loops.

use super::retry::RetryQueue;
use super::socket::{is_timeout, DatagramSocket};
use super::TransportStats;
use crate::config::MAX_DATAGRAM_SIZE;
use crate::message::NetworkMessage;
use crossbeam::channel::Sender;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// State shared by every worker of one transport.
#[derive(Clone)]
pub(super) struct WorkerShared {
    pub running: Arc<AtomicBool>,
    pub stats: Arc<TransportStats>,
    pub ready: Sender<&'static str>,
}

/// Read datagrams until stopped or a non-timeout I/O error.
///
/// `dst` is recorded as the destination of every message, letting the
/// dispatcher tell multicast from unicast arrivals.
pub(super) fn receive_loop<S: DatagramSocket>(
    name: &'static str,
    socket: S,
    dst: SocketAddr,
    inbound: Sender<NetworkMessage>,
    shared: WorkerShared,
) {
    let _ = shared.ready.send(name);
    log::debug!("[transport] {} running", name);

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    while shared.running.load(Ordering::Acquire) {
        match socket.recv_datagram(&mut buf) {
            Ok((len, src)) => {
                shared.stats.record_received();
                log::debug!("[transport] {} <- {} ({} bytes)", name, src, len);
                let message = NetworkMessage::new(buf[..len].to_vec(), src, dst);
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Err(ref e) if is_timeout(e) => {}
            Err(e) => {
                log::error!("[transport] {} terminating on I/O error: {}", name, e);
                break;
            }
        }
    }

    log::debug!("[transport] {} stopped", name);
}

/// Transmit due envelopes and reschedule them until their repeats run out.
pub(super) fn send_loop<S: DatagramSocket>(
    name: &'static str,
    socket: S,
    queue: Arc<RetryQueue>,
    upper_delay: Duration,
    poll: Duration,
    shared: WorkerShared,
) {
    let _ = shared.ready.send(name);
    log::debug!("[transport] {} running", name);

    while shared.running.load(Ordering::Acquire) {
        let Some(mut envelope) = queue.pop_timeout(poll) else {
            continue;
        };

        let message = envelope.message();
        match socket.send_datagram(message.payload(), message.dst()) {
            Ok(_) => {
                shared.stats.record_sent();
                log::debug!(
                    "[retry] {} -> {} ({} bytes, {} left)",
                    name,
                    message.dst(),
                    message.len(),
                    envelope.repeats_remaining().saturating_sub(1)
                );
            }
            Err(e) => {
                shared.stats.record_dropped();
                log::warn!("[retry] {} send to {} failed: {}", name, message.dst(), e);
            }
        }

        if envelope.backoff(upper_delay) {
            queue.reschedule(envelope);
        } else {
            queue.finish();
        }
    }

    log::debug!("[transport] {} stopped", name);
}
