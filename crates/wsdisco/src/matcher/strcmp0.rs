// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::ScopeMatcher;
use crate::error::Result;
use crate::service::ServiceDescription;

/// Case-sensitive literal comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct Strcmp0Matcher;

impl ScopeMatcher for Strcmp0Matcher {
    fn matches(&self, target: &ServiceDescription, probe_scopes: &[String]) -> Result<bool> {
        Ok(probe_scopes
            .iter()
            .all(|probe| target.scopes.iter().any(|scope| scope == probe)))
    }
}
