// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::ScopeMatcher;
use crate::error::Result;
use crate::service::ServiceDescription;
use uuid::Uuid;

/// UUID scope comparison.
///
/// Scopes are normalized by stripping an optional `urn:` then an optional
/// `uuid:` prefix (case-insensitive) and parsed as UUIDs, so hex case does
/// not matter. Scopes that are not UUIDs are skipped on both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidMatcher;

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &s[prefix.len()..],
        _ => s,
    }
}

pub(crate) fn normalize(scope: &str) -> Option<Uuid> {
    let rest = strip_prefix_ignore_case(scope.trim(), "urn:");
    let rest = strip_prefix_ignore_case(rest, "uuid:");
    Uuid::parse_str(rest).ok()
}

impl ScopeMatcher for UuidMatcher {
    fn matches(&self, target: &ServiceDescription, probe_scopes: &[String]) -> Result<bool> {
        if probe_scopes.is_empty() {
            return Ok(true);
        }

        let targets: Vec<Uuid> = target.scopes.iter().filter_map(|s| normalize(s)).collect();
        let probes: Vec<Uuid> = probe_scopes.iter().filter_map(|s| normalize(s)).collect();

        // Nothing usable in a scoped probe: no match.
        if probes.is_empty() {
            return Ok(false);
        }
        Ok(probes.iter().all(|probe| targets.contains(probe)))
    }
}
