// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Storage backends for the service registry.

use crate::error::Result;
use crate::service::ServiceDescription;

/// Backing storage of a [`ServiceRegistry`](super::ServiceRegistry).
///
/// Implementations do not lock; the registry serializes every call.
/// Errors are surfaced to `publish`/`unpublish` callers as-is.
pub trait ServiceStore: Send {
    fn get(&self, endpoint: &str) -> Result<Option<ServiceDescription>>;

    /// Append a service whose endpoint is not stored yet.
    fn insert(&mut self, service: ServiceDescription) -> Result<()>;

    /// Replace the entry with the same endpoint. `Ok(false)` if absent.
    fn update(&mut self, service: &ServiceDescription) -> Result<bool>;

    /// `Ok(false)` if absent.
    fn remove(&mut self, endpoint: &str) -> Result<bool>;

    /// Every entry, in insertion order.
    fn all(&self) -> Result<Vec<ServiceDescription>>;

    fn len(&self) -> usize;
}

/// In-memory store, insertion ordered.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    services: Vec<ServiceDescription>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, endpoint: &str) -> Option<usize> {
        self.services
            .iter()
            .position(|s| s.endpoint_reference() == endpoint)
    }
}

impl ServiceStore for MemoryStore {
    fn get(&self, endpoint: &str) -> Result<Option<ServiceDescription>> {
        Ok(self.position(endpoint).map(|idx| self.services[idx].clone()))
    }

    fn insert(&mut self, service: ServiceDescription) -> Result<()> {
        self.services.push(service);
        Ok(())
    }

    fn update(&mut self, service: &ServiceDescription) -> Result<bool> {
        match self.position(service.endpoint_reference()) {
            Some(idx) => {
                self.services[idx].assign_from(service);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&mut self, endpoint: &str) -> Result<bool> {
        match self.position(endpoint) {
            Some(idx) => {
                self.services.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn all(&self) -> Result<Vec<ServiceDescription>> {
        Ok(self.services.clone())
    }

    fn len(&self) -> usize {
        self.services.len()
    }
}
