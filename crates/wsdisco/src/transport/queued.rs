// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Four-worker queued transport over a pair of datagram sockets.

use super::retry::{RetryEnvelope, RetryQueue};
use super::socket::DatagramSocket;
use super::worker::{receive_loop, send_loop, WorkerShared};
use super::{StatsSnapshot, Transport, TransportStats};
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::message::NetworkMessage;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const WORKER_COUNT: usize = 4;

/// Transport with two receivers and two retrying senders.
///
/// `multicast_socket` receives group traffic; `unicast_socket` receives
/// directed replies and carries every outbound datagram, so peers answer
/// to [`Transport::local_addr`].
pub struct QueuedTransport<S: DatagramSocket> {
    multicast_socket: S,
    unicast_socket: S,
    local_addr: SocketAddr,
    multicast_addr: SocketAddr,
    retry: RetryConfig,
    poll: Duration,
    drain_timeout: Duration,
    inbound_tx: Sender<NetworkMessage>,
    inbound_rx: Receiver<NetworkMessage>,
    multicast_queue: Arc<RetryQueue>,
    unicast_queue: Arc<RetryQueue>,
    running: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<TransportStats>,
}

impl<S: DatagramSocket> QueuedTransport<S> {
    /// Assemble a transport from already bound sockets.
    ///
    /// `poll` bounds how long a sender waits on an empty queue before
    /// re-checking the stop flag.
    pub fn from_sockets(
        multicast_socket: S,
        unicast_socket: S,
        multicast_addr: SocketAddr,
        retry: RetryConfig,
        poll: Duration,
        drain_timeout: Duration,
    ) -> Result<Self> {
        let local_addr = unicast_socket
            .local_addr()
            .map_err(|e| Error::transport_init("query unicast address", e))?;
        let (inbound_tx, inbound_rx) = channel::unbounded();

        Ok(Self {
            multicast_socket,
            unicast_socket,
            local_addr,
            multicast_addr,
            retry,
            poll,
            drain_timeout,
            inbound_tx,
            inbound_rx,
            multicast_queue: Arc::new(RetryQueue::new()),
            unicast_queue: Arc::new(RetryQueue::new()),
            running: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            stats: Arc::new(TransportStats::default()),
        })
    }

    fn clone_socket(socket: &S, name: &str) -> Result<S> {
        socket
            .try_clone()
            .map_err(|e| Error::transport_init(format!("clone socket for {}", name), e))
    }

    fn spawn(&self, name: &'static str, body: impl FnOnce() + Send + 'static) -> Result<()> {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(|e| Error::transport_init(format!("spawn {}", name), e))?;
        self.workers.lock().push(handle);
        Ok(())
    }

    fn spawn_workers(&self, shared: &WorkerShared) -> Result<()> {
        let socket = Self::clone_socket(&self.multicast_socket, "wsd-mcast-rx")?;
        let (dst, inbound, shared_rx) = (
            self.multicast_addr,
            self.inbound_tx.clone(),
            shared.clone(),
        );
        self.spawn("wsd-mcast-rx", move || {
            receive_loop("wsd-mcast-rx", socket, dst, inbound, shared_rx);
        })?;

        let socket = Self::clone_socket(&self.unicast_socket, "wsd-ucast-rx")?;
        let (dst, inbound, shared_rx) = (self.local_addr, self.inbound_tx.clone(), shared.clone());
        self.spawn("wsd-ucast-rx", move || {
            receive_loop("wsd-ucast-rx", socket, dst, inbound, shared_rx);
        })?;

        let upper = self.retry.upper_delay;
        let poll = self.poll;

        let socket = Self::clone_socket(&self.unicast_socket, "wsd-mcast-tx")?;
        let (queue, shared_tx) = (Arc::clone(&self.multicast_queue), shared.clone());
        self.spawn("wsd-mcast-tx", move || {
            send_loop("wsd-mcast-tx", socket, queue, upper, poll, shared_tx);
        })?;

        let socket = Self::clone_socket(&self.unicast_socket, "wsd-ucast-tx")?;
        let (queue, shared_tx) = (Arc::clone(&self.unicast_queue), shared.clone());
        self.spawn("wsd-ucast-tx", move || {
            send_loop("wsd-ucast-tx", socket, queue, upper, poll, shared_tx);
        })?;

        Ok(())
    }

    fn queue_for(&self, multicast: bool) -> &Arc<RetryQueue> {
        if multicast {
            &self.multicast_queue
        } else {
            &self.unicast_queue
        }
    }

    fn stop_workers(&self) {
        self.running.store(false, Ordering::Release);
        self.multicast_queue.close();
        self.unicast_queue.close();
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                log::warn!("[transport] worker panicked during shutdown");
            }
        }
    }

    /// Retransmission schedule in use.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }
}

impl<S: DatagramSocket> Transport for QueuedTransport<S> {
    fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(Error::InvalidState("transport already started".into()));
        }
        self.multicast_queue.reopen();
        self.unicast_queue.reopen();

        let (ready_tx, ready_rx) = channel::bounded(WORKER_COUNT);
        let shared = WorkerShared {
            running: Arc::clone(&self.running),
            stats: Arc::clone(&self.stats),
            ready: ready_tx,
        };

        if let Err(e) = self.spawn_workers(&shared) {
            self.stop_workers();
            return Err(e);
        }
        drop(shared);

        for _ in 0..WORKER_COUNT {
            if ready_rx.recv().is_err() {
                self.stop_workers();
                return Err(Error::InvalidState("transport worker exited before start".into()));
            }
        }

        log::info!(
            "[transport] started (unicast {}, multicast {})",
            self.local_addr,
            self.multicast_addr
        );
        Ok(())
    }

    fn send(&self, message: NetworkMessage, blocking: bool) -> Result<()> {
        if !self.running.load(Ordering::Acquire) {
            return Err(Error::InvalidState("transport not running".into()));
        }

        let multicast = message.dst() == self.multicast_addr;
        let envelope = RetryEnvelope::new(
            message,
            self.retry.repeats(multicast),
            self.retry.initial_delay(),
            multicast,
        );
        let queue = self.queue_for(multicast);
        queue.push(envelope);

        if blocking && !queue.wait_drained(self.drain_timeout) {
            log::warn!(
                "[transport] blocking send: queue not drained after {:?}",
                self.drain_timeout
            );
        }
        Ok(())
    }

    fn recv(&self) -> Option<NetworkMessage> {
        while self.running.load(Ordering::Acquire) {
            if let Some(message) = self.recv_timeout(self.poll) {
                return Some(message);
            }
        }
        None
    }

    fn recv_timeout(&self, timeout: Duration) -> Option<NetworkMessage> {
        self.inbound_rx.recv_timeout(timeout).ok()
    }

    fn done(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let deadline = Instant::now() + self.drain_timeout;
        for queue in [&self.multicast_queue, &self.unicast_queue] {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !queue.wait_drained(remaining) {
                log::warn!(
                    "[transport] {} envelope(s) abandoned at shutdown",
                    queue.pending()
                );
            }
        }

        self.stop_workers();
        log::info!("[transport] stopped ({})", self.local_addr);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn multicast_addr(&self) -> SocketAddr {
        self.multicast_addr
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<S: DatagramSocket> Drop for QueuedTransport<S> {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            self.stop_workers();
        }
    }
}
