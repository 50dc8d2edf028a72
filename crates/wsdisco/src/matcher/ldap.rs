// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{MatchBy, ScopeMatcher};
use crate::error::{Error, Result};
use crate::service::ServiceDescription;

/// LDAP scope matching placeholder; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapMatcher;

impl ScopeMatcher for LdapMatcher {
    fn matches(&self, _target: &ServiceDescription, _probe_scopes: &[String]) -> Result<bool> {
        Err(Error::UnsupportedMatcher(MatchBy::Ldap))
    }

    fn ensure_supported(&self) -> Result<()> {
        Err(Error::UnsupportedMatcher(MatchBy::Ldap))
    }
}
