// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service description and probe criteria.

use crate::matcher::MatchBy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualified port type name (`{namespace}localName`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    pub namespace: String,
    pub local_name: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}

/// A discoverable service.
///
/// Identity is the endpoint reference. It is fixed at construction; every
/// other field is replaced wholesale by a registry update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    endpoint_reference: String,
    /// Port types implemented by the service.
    pub types: Vec<QName>,
    /// Scope URIs, in announcement order.
    pub scopes: Vec<String>,
    /// Invocation addresses; may be empty until resolved.
    pub xaddrs: Vec<String>,
    /// Bumped by the publisher whenever the metadata changes.
    pub metadata_version: u32,
}

impl ServiceDescription {
    pub fn new(endpoint_reference: impl Into<String>) -> Self {
        Self {
            endpoint_reference: endpoint_reference.into(),
            types: Vec::new(),
            scopes: Vec::new(),
            xaddrs: Vec::new(),
            metadata_version: 1,
        }
    }

    /// Service with a fresh `urn:uuid:` endpoint reference.
    pub fn with_random_endpoint() -> Self {
        Self::new(format!("urn:uuid:{}", uuid::Uuid::new_v4()))
    }

    pub fn endpoint_reference(&self) -> &str {
        &self.endpoint_reference
    }

    pub fn with_type(mut self, qname: QName) -> Self {
        if !self.types.contains(&qname) {
            self.types.push(qname);
        }
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn with_xaddr(mut self, xaddr: impl Into<String>) -> Self {
        self.xaddrs.push(xaddr.into());
        self
    }

    pub fn with_metadata_version(mut self, version: u32) -> Self {
        self.metadata_version = version;
        self
    }

    /// True if every requested type is implemented. Empty requests match.
    pub fn implements_all(&self, requested: &[QName]) -> bool {
        requested.iter().all(|t| self.types.contains(t))
    }

    /// Copy all mutable fields from `other`, keeping this identity.
    pub(crate) fn assign_from(&mut self, other: &ServiceDescription) {
        self.types.clone_from(&other.types);
        self.scopes.clone_from(&other.scopes);
        self.xaddrs.clone_from(&other.xaddrs);
        self.metadata_version = other.metadata_version;
    }
}

/// Probe criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub types: Vec<QName>,
    pub scopes: Vec<String>,
    /// Scope algorithm; `None` selects the node default.
    pub match_by: Option<MatchBy>,
}

impl ProbeRequest {
    /// Unscoped, untyped probe.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, qname: QName) -> Self {
        self.types.push(qname);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn with_match_by(mut self, match_by: MatchBy) -> Self {
        self.match_by = Some(match_by);
        self
    }
}
