// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service registry (directory).
//!
//! Maps endpoint references to service descriptions. A node keeps two of
//! them: services it publishes and services it discovered. Every operation
//! runs under one exclusive lock, including snapshots, so a concurrent
//! [`ServiceRegistry::use_storage`] swap is never observed half done.

mod store;

pub use store::{MemoryStore, ServiceStore};

use crate::error::{Error, Result};
use crate::matcher::{MatchBy, MatcherTable};
use crate::service::{QName, ServiceDescription};
use parking_lot::Mutex;

/// Thread-safe service directory over a swappable [`ServiceStore`].
pub struct ServiceRegistry {
    store: Mutex<Box<dyn ServiceStore>>,
    strict: bool,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("len", &self.len())
            .field("strict", &self.strict)
            .finish()
    }
}

impl ServiceRegistry {
    /// In-memory registry with upsert semantics.
    pub fn new() -> Self {
        Self::with_store(Box::new(MemoryStore::new()))
    }

    pub fn with_store(store: Box<dyn ServiceStore>) -> Self {
        Self {
            store: Mutex::new(store),
            strict: false,
        }
    }

    /// Builder: make `store()` reject known endpoints.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Insert, or update an existing entry with the same endpoint.
    ///
    /// In strict mode an existing entry is an [`Error::DuplicateEndpoint`].
    pub fn store(&self, service: ServiceDescription) -> Result<()> {
        let mut store = self.store.lock();
        if store.get(service.endpoint_reference())?.is_some() {
            if self.strict {
                return Err(Error::DuplicateEndpoint(
                    service.endpoint_reference().to_owned(),
                ));
            }
            log::debug!("[registry] update {}", service.endpoint_reference());
            store.update(&service)?;
        } else {
            log::debug!("[registry] store {}", service.endpoint_reference());
            store.insert(service)?;
        }
        Ok(())
    }

    /// Replace every field but the identity. `Ok(false)` if not stored.
    pub fn update(&self, service: &ServiceDescription) -> Result<bool> {
        self.store.lock().update(service)
    }

    /// Remove by endpoint reference. Absent entries are a no-op.
    pub fn remove(&self, endpoint: &str) -> Result<bool> {
        let removed = self.store.lock().remove(endpoint)?;
        if removed {
            log::debug!("[registry] removed {}", endpoint);
        }
        Ok(removed)
    }

    pub fn remove_service(&self, service: &ServiceDescription) -> Result<bool> {
        self.remove(service.endpoint_reference())
    }

    /// Look up one service by endpoint reference.
    pub fn find_service(&self, endpoint: &str) -> Result<Option<ServiceDescription>> {
        self.store.lock().get(endpoint)
    }

    pub fn contains(&self, endpoint: &str) -> Result<bool> {
        Ok(self.find_service(endpoint)?.is_some())
    }

    /// Services implementing all `types` whose scopes satisfy `scopes` under `by`.
    ///
    /// Empty `types` matches every service. Never fails because nothing
    /// matched; fails when the algorithm does (e.g. LDAP).
    pub fn match_by(
        &self,
        types: &[QName],
        scopes: &[String],
        by: MatchBy,
        matchers: &MatcherTable,
    ) -> Result<Vec<ServiceDescription>> {
        let matcher = matchers.get(by)?;
        matcher.ensure_supported()?;
        let store = self.store.lock();
        let mut matched = Vec::new();
        for service in store.all()? {
            if service.implements_all(types) && matcher.matches(&service, scopes)? {
                matched.push(service);
            }
        }
        Ok(matched)
    }

    /// Snapshot of every entry; later mutations are not visible through it.
    pub fn match_all(&self) -> Result<Vec<ServiceDescription>> {
        self.store.lock().all()
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap the backing store.
    ///
    /// With `migrate_existing`, every current entry is copied into `new_store`
    /// first (upserting over entries it already holds). The swap happens under
    /// the registry lock; on a migration error the old store stays in place.
    pub fn use_storage(
        &self,
        mut new_store: Box<dyn ServiceStore>,
        migrate_existing: bool,
    ) -> Result<()> {
        let mut store = self.store.lock();
        if migrate_existing {
            for service in store.all()? {
                if !new_store.update(&service)? {
                    new_store.insert(service)?;
                }
            }
        }
        log::debug!(
            "[registry] storage swapped (migrated={}, entries={})",
            migrate_existing,
            new_store.len()
        );
        *store = new_store;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
