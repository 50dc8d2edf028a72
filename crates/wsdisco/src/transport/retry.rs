// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delay-ordered retransmission queue.
//!
//! Each outbound datagram travels in a [`RetryEnvelope`] that carries its
//! remaining repeat count and the delay before its next transmission. The
//! sender worker pops envelopes once due, transmits, then calls
//! [`RetryEnvelope::backoff`]: the delay doubles (capped) and the envelope
//! is rescheduled until the repeat count reaches zero.
//!
//! ```text
//! push(T0) --T0--> send #1 --2*T0--> send #2 --min(4*T0,upper)--> ... --> finish
//! ```

use crate::message::NetworkMessage;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source for scheduling.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A datagram plus its retransmission state.
#[derive(Debug, Clone)]
pub struct RetryEnvelope {
    message: NetworkMessage,
    repeats_remaining: u32,
    next_delay: Duration,
    multicast: bool,
}

impl RetryEnvelope {
    pub fn new(
        message: NetworkMessage,
        repeats: u32,
        initial_delay: Duration,
        multicast: bool,
    ) -> Self {
        Self {
            message,
            repeats_remaining: repeats,
            next_delay: initial_delay,
            multicast,
        }
    }

    pub fn message(&self) -> &NetworkMessage {
        &self.message
    }

    pub fn repeats_remaining(&self) -> u32 {
        self.repeats_remaining
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    pub fn is_multicast(&self) -> bool {
        self.multicast
    }

    /// Account for one transmission.
    ///
    /// Returns `true` if another transmission is due, after doubling the
    /// delay (capped at `upper`).
    pub fn backoff(&mut self, upper: Duration) -> bool {
        self.repeats_remaining = self.repeats_remaining.saturating_sub(1);
        if self.repeats_remaining == 0 {
            return false;
        }
        self.next_delay = self.next_delay.saturating_mul(2).min(upper);
        true
    }
}

struct Scheduled {
    due: Instant,
    seq: u64,
    envelope: RetryEnvelope,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed: BinaryHeap is a max-heap, the earliest due must be on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Scheduled>,
    seq: u64,
    /// Envelopes pushed and not yet finished (queued or in transmission).
    pending: usize,
    closed: bool,
}

/// Delay queue of [`RetryEnvelope`]s with a drain barrier.
pub struct RetryQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    drained: Condvar,
    clock: Arc<dyn Clock>,
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            drained: Condvar::new(),
            clock,
        }
    }

    fn schedule(&self, state: &mut QueueState, envelope: RetryEnvelope) {
        let due = self.clock.now() + envelope.next_delay;
        state.seq += 1;
        let seq = state.seq;
        state.heap.push(Scheduled { due, seq, envelope });
        self.available.notify_one();
    }

    /// Enqueue a new envelope; due after its `next_delay`.
    pub fn push(&self, envelope: RetryEnvelope) {
        let mut state = self.state.lock();
        state.pending += 1;
        self.schedule(&mut state, envelope);
    }

    /// Put back an envelope that still has repeats left.
    pub fn reschedule(&self, envelope: RetryEnvelope) {
        let mut state = self.state.lock();
        self.schedule(&mut state, envelope);
    }

    /// Mark one envelope as done (dropped after its last transmission).
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Pop the earliest envelope if it is due.
    pub fn try_pop(&self) -> Option<RetryEnvelope> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        match state.heap.peek() {
            Some(top) if top.due <= now => state.heap.pop().map(|s| s.envelope),
            _ => None,
        }
    }

    /// Wait up to `timeout` for an envelope to become due.
    ///
    /// Returns `None` on timeout or once the queue is closed.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<RetryEnvelope> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            let now = self.clock.now();
            let wait = match state.heap.peek() {
                Some(top) if top.due <= now => return state.heap.pop().map(|s| s.envelope),
                Some(top) => top.due - now,
                None => timeout,
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let _ = self.available.wait_for(&mut state, wait.min(remaining));
        }
    }

    /// Block until every pushed envelope has finished.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.pending > 0 {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                return state.pending == 0;
            }
        }
        true
    }

    /// Wake every waiter; subsequent pops return `None`.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Re-open after [`RetryQueue::close`], dropping leftovers.
    pub fn reopen(&self) {
        let mut state = self.state.lock();
        state.heap.clear();
        state.pending = 0;
        state.closed = false;
    }

    /// Envelopes currently scheduled.
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }
}
