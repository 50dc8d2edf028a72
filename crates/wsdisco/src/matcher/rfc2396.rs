// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RFC 2396 scope matching.
//!
//! A probe scope matches a target scope when:
//! - schemes are equal (case-insensitive),
//! - authorities are equal (case-insensitive),
//! - the probe path segments are a positional prefix of the target path
//!   segments (case-sensitive, compared segment by segment).
//!
//! Query and fragment are ignored. Scopes containing `.` or `..` path
//! segments never match.

use super::ScopeMatcher;
use crate::error::Result;
use crate::service::ServiceDescription;

#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc2396Matcher;

/// Components of a scope URI relevant to matching.
#[derive(Debug, PartialEq, Eq)]
struct ScopeUri<'a> {
    scheme: &'a str,
    authority: &'a str,
    segments: Vec<&'a str>,
}

impl<'a> ScopeUri<'a> {
    fn parse(uri: &'a str) -> Option<Self> {
        let (scheme, rest) = uri.split_once(':')?;
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return None;
        }

        // Drop fragment then query.
        let rest = rest.split('#').next().unwrap_or_default();
        let rest = rest.split('?').next().unwrap_or_default();

        let (authority, path) = match rest.strip_prefix("//") {
            Some(hier) => match hier.find('/') {
                Some(idx) => (&hier[..idx], &hier[idx..]),
                None => (hier, ""),
            },
            None => ("", rest),
        };

        let trimmed = path.trim_matches('/');
        let segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return None;
        }

        Some(Self {
            scheme,
            authority,
            segments,
        })
    }

    fn is_prefix_of(&self, target: &ScopeUri<'_>) -> bool {
        self.scheme.eq_ignore_ascii_case(target.scheme)
            && self.authority.eq_ignore_ascii_case(target.authority)
            && self.segments.len() <= target.segments.len()
            && self
                .segments
                .iter()
                .zip(&target.segments)
                .all(|(p, t)| p == t)
    }
}

/// Match one probe scope against one target scope.
pub fn scope_matches(probe: &str, target: &str) -> bool {
    match (ScopeUri::parse(probe), ScopeUri::parse(target)) {
        (Some(p), Some(t)) => p.is_prefix_of(&t),
        _ => false,
    }
}

impl ScopeMatcher for Rfc2396Matcher {
    fn matches(&self, target: &ServiceDescription, probe_scopes: &[String]) -> Result<bool> {
        Ok(probe_scopes.iter().all(|probe| {
            target
                .scopes
                .iter()
                .any(|scope| scope_matches(probe, scope))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_prefix() {
        assert!(scope_matches("http://h/a", "http://h/a/b"));
        assert!(scope_matches("http://h/a/b", "http://h/a/b/c"));
        assert!(scope_matches("http://h/a/b", "http://h/a/b"));
        assert!(!scope_matches("http://h/a", "http://h/aa"));
        assert!(!scope_matches("http://h/a/", "http://h/aa/b"));
        assert!(!scope_matches("http://h/a/b/c", "http://h/a/b"));
    }

    #[test]
    fn test_scheme_and_authority_case_insensitive() {
        assert!(scope_matches("HTTP://Example.COM/a", "http://example.com/a/b"));
        assert!(!scope_matches("http://example.com/A", "http://example.com/a"));
    }

    #[test]
    fn test_authority_must_match() {
        assert!(!scope_matches("http://h1/a", "http://h2/a"));
        assert!(!scope_matches("http://h/a", "ftp://h/a"));
        assert!(!scope_matches("http://h:80/a", "http://h/a"));
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        assert!(scope_matches("http://h/a?x=1", "http://h/a/b#frag"));
        assert!(scope_matches("http://h/a#f", "http://h/a?q"));
    }

    #[test]
    fn test_trailing_slash_and_root() {
        assert!(scope_matches("http://h/a/", "http://h/a/b"));
        assert!(scope_matches("http://h/", "http://h/anything"));
        assert!(scope_matches("http://h", "http://h/anything"));
    }

    #[test]
    fn test_dot_segments_never_match() {
        assert!(!scope_matches("http://h/a/../b", "http://h/b"));
        assert!(!scope_matches("http://h/a", "http://h/a/./b"));
    }

    #[test]
    fn test_unparseable_scope() {
        assert!(!scope_matches("no-scheme", "http://h/a"));
        assert!(!scope_matches("http://h/a", ""));
    }

    #[test]
    fn test_all_probe_scopes_required() {
        let target = ServiceDescription::new("urn:uuid:t")
            .with_scope("http://h/a/b")
            .with_scope("ldap:///ou=room,dc=x");
        let one = vec!["http://h/a".to_string()];
        let both = vec!["http://h/a".to_string(), "http://other/".to_string()];

        assert!(Rfc2396Matcher.matches(&target, &one).expect("match"));
        assert!(!Rfc2396Matcher.matches(&target, &both).expect("match"));
    }
}
