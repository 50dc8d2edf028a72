// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Duplicate message filter.
//!
//! Keeps the last N message identifiers (FIFO eviction). Every outbound
//! message and every parsed inbound message is registered, so multicast
//! loopback of our own traffic and SOAP-over-UDP retransmissions are
//! processed at most once.

use crate::config::DEFAULT_DUPLICATE_HISTORY;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded history of recently seen message identifiers.
pub struct DuplicateFilter {
    history: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_HISTORY)
    }
}

impl DuplicateFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    /// Remember `id`, evicting the oldest entry when full.
    pub fn register_received(&self, id: &str) {
        let mut history = self.history.lock();
        history.push_back(id.to_owned());
        while history.len() > self.capacity {
            history.pop_front();
        }
    }

    /// Linear, case-sensitive lookup. `None` is never a duplicate.
    pub fn is_duplicate(&self, id: Option<&str>) -> bool {
        match id {
            Some(id) => self.history.lock().iter().any(|seen| seen == id),
            None => false,
        }
    }

    /// Check and register in one critical section.
    ///
    /// Returns `Ok(true)` when `id` was already known (message must be
    /// dropped), `Ok(false)` when it is new and has now been registered.
    pub fn check_and_register(&self, id: Option<&str>) -> Result<bool> {
        let id = id.ok_or(Error::MissingMessageId)?;
        let mut history = self.history.lock();
        if history.iter().any(|seen| seen == id) {
            return Ok(true);
        }
        history.push_back(id.to_owned());
        while history.len() > self.capacity {
            history.pop_front();
        }
        Ok(false)
    }
}
