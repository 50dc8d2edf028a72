// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scope matching algorithms.
//!
//! Each algorithm is a [`ScopeMatcher`] value; a [`MatcherTable`] maps the
//! [`MatchBy`] identifier carried by a probe to the matcher instance.
//!
//! | MatchBy   | Rule                                                   |
//! |-----------|--------------------------------------------------------|
//! | Rfc2396   | scheme/authority case-insensitive, path segment prefix |
//! | Uuid      | `urn:uuid:` normalized, case-insensitive UUID equality |
//! | Strcmp0   | case-sensitive string equality                         |
//! | Ldap      | not implemented, always [`Error::UnsupportedMatcher`]  |
//!
//! An empty probe scope list matches every service, except under LDAP.

mod ldap;
mod rfc2396;
mod strcmp0;
mod uuid;

pub use self::ldap::LdapMatcher;
pub use self::rfc2396::Rfc2396Matcher;
pub use self::strcmp0::Strcmp0Matcher;
pub use self::uuid::UuidMatcher;

use crate::config::ProtocolVersion;
use crate::error::{Error, Result};
use crate::service::ServiceDescription;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Scope matching algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchBy {
    #[default]
    Rfc2396,
    Uuid,
    Strcmp0,
    Ldap,
}

impl MatchBy {
    pub const ALL: [MatchBy; 4] = [Self::Rfc2396, Self::Uuid, Self::Strcmp0, Self::Ldap];

    fn suffix(self, version: ProtocolVersion) -> &'static str {
        match (self, version) {
            (Self::Rfc2396, ProtocolVersion::Wsd2005) => "rfc2396",
            (Self::Rfc2396, ProtocolVersion::Wsd11) => "rfc3986",
            (Self::Uuid, _) => "uuid",
            (Self::Strcmp0, _) => "strcmp0",
            (Self::Ldap, _) => "ldap",
        }
    }

    /// MatchBy URI in the namespace of `version`.
    pub fn uri(self, version: ProtocolVersion) -> String {
        format!("{}/{}", version.namespace(), self.suffix(version))
    }

    /// Parse a MatchBy URI from either namespace.
    pub fn from_uri(uri: &str) -> Option<Self> {
        [ProtocolVersion::Wsd2005, ProtocolVersion::Wsd11]
            .into_iter()
            .find_map(|version| {
                let rest = uri.strip_prefix(version.namespace())?.strip_prefix('/')?;
                Self::ALL
                    .into_iter()
                    .find(|by| by.suffix(version) == rest)
            })
    }
}

impl fmt::Display for MatchBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rfc2396 => "rfc2396",
            Self::Uuid => "uuid",
            Self::Strcmp0 => "strcmp0",
            Self::Ldap => "ldap",
        };
        f.write_str(name)
    }
}

/// Decides whether a service satisfies a probe's scopes.
pub trait ScopeMatcher: Send + Sync {
    /// `probe_scopes` empty means an unscoped probe.
    fn matches(&self, target: &ServiceDescription, probe_scopes: &[String]) -> Result<bool>;

    /// Fails up front for algorithms that cannot match anything.
    fn ensure_supported(&self) -> Result<()> {
        Ok(())
    }
}

/// Strategy table keyed by [`MatchBy`].
#[derive(Clone)]
pub struct MatcherTable {
    matchers: HashMap<MatchBy, Arc<dyn ScopeMatcher>>,
}

impl Default for MatcherTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(MatchBy::Rfc2396, Arc::new(Rfc2396Matcher));
        table.register(MatchBy::Uuid, Arc::new(UuidMatcher));
        table.register(MatchBy::Strcmp0, Arc::new(Strcmp0Matcher));
        table.register(MatchBy::Ldap, Arc::new(LdapMatcher));
        table
    }
}

impl fmt::Debug for MatcherTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.matchers.keys()).finish()
    }
}

impl MatcherTable {
    /// Table without any algorithm.
    pub fn empty() -> Self {
        Self {
            matchers: HashMap::new(),
        }
    }

    /// Install or replace the matcher for `by`.
    pub fn register(&mut self, by: MatchBy, matcher: Arc<dyn ScopeMatcher>) {
        self.matchers.insert(by, matcher);
    }

    pub fn get(&self, by: MatchBy) -> Result<Arc<dyn ScopeMatcher>> {
        self.matchers
            .get(&by)
            .cloned()
            .ok_or(Error::UnsupportedMatcher(by))
    }

    pub fn matches(
        &self,
        by: MatchBy,
        target: &ServiceDescription,
        probe_scopes: &[String],
    ) -> Result<bool> {
        self.get(by)?.matches(target, probe_scopes)
    }
}
