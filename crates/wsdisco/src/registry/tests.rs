// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use std::sync::Arc;

fn calc() -> QName {
    QName::new("urn:test", "Calc")
}

fn make_service(endpoint: &str, scope: &str) -> ServiceDescription {
    ServiceDescription::new(endpoint)
        .with_type(calc())
        .with_scope(scope)
}

/// Store that refuses every write.
struct ReadOnlyStore;

impl ServiceStore for ReadOnlyStore {
    fn get(&self, _endpoint: &str) -> Result<Option<ServiceDescription>> {
        Ok(None)
    }
    fn insert(&mut self, _service: ServiceDescription) -> Result<()> {
        Err(Error::Registry("read-only".into()))
    }
    fn update(&mut self, _service: &ServiceDescription) -> Result<bool> {
        Err(Error::Registry("read-only".into()))
    }
    fn remove(&mut self, _endpoint: &str) -> Result<bool> {
        Err(Error::Registry("read-only".into()))
    }
    fn all(&self) -> Result<Vec<ServiceDescription>> {
        Ok(Vec::new())
    }
    fn len(&self) -> usize {
        0
    }
}

#[test]
fn test_store_then_update_keeps_identity_and_size() {
    let registry = ServiceRegistry::new();
    registry
        .store(make_service("urn:uuid:x", "http://s"))
        .expect("store");
    registry
        .store(make_service("urn:uuid:y", "http://s"))
        .expect("store");

    let updated = ServiceDescription::new("urn:uuid:x")
        .with_scope("http://other/a")
        .with_xaddr("http://10.0.0.5:8080/calc")
        .with_metadata_version(2);
    assert!(registry.update(&updated).expect("update"));

    assert_eq!(registry.len(), 2);
    let found = registry
        .find_service("urn:uuid:x")
        .expect("find")
        .expect("present");
    assert_eq!(found, updated);
}

#[test]
fn test_store_is_upsert() {
    let registry = ServiceRegistry::new();
    registry
        .store(make_service("urn:uuid:x", "http://a"))
        .expect("store");
    registry
        .store(make_service("urn:uuid:x", "http://b"))
        .expect("upsert");

    assert_eq!(registry.len(), 1);
    let found = registry
        .find_service("urn:uuid:x")
        .expect("find")
        .expect("present");
    assert_eq!(found.scopes, vec!["http://b".to_string()]);
}

#[test]
fn test_strict_store_rejects_duplicate() {
    let registry = ServiceRegistry::new().strict(true);
    registry
        .store(make_service("urn:uuid:x", "http://a"))
        .expect("store");
    let err = registry
        .store(make_service("urn:uuid:x", "http://b"))
        .expect_err("duplicate");
    assert!(matches!(err, Error::DuplicateEndpoint(ref ep) if ep == "urn:uuid:x"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_update_and_remove_absent_are_not_errors() {
    let registry = ServiceRegistry::new();
    assert!(!registry
        .update(&make_service("urn:uuid:none", "http://a"))
        .expect("update"));
    assert!(!registry.remove("urn:uuid:none").expect("remove"));
    assert!(registry.is_empty());
}

#[test]
fn test_remove_service() {
    let registry = ServiceRegistry::new();
    let svc = make_service("urn:uuid:x", "http://a");
    registry.store(svc.clone()).expect("store");
    assert!(registry.remove_service(&svc).expect("remove"));
    assert!(registry.find_service("urn:uuid:x").expect("find").is_none());
}

#[test]
fn test_match_by_types_and_scopes() {
    let registry = ServiceRegistry::new();
    let matchers = MatcherTable::default();
    registry
        .store(make_service("urn:uuid:a", "http://h/room/1"))
        .expect("store");
    registry
        .store(
            ServiceDescription::new("urn:uuid:b")
                .with_type(QName::new("urn:test", "Echo"))
                .with_scope("http://h/room/2"),
        )
        .expect("store");

    let all = registry
        .match_by(&[], &[], MatchBy::Rfc2396, &matchers)
        .expect("match");
    assert_eq!(all.len(), 2);

    let calcs = registry
        .match_by(&[calc()], &[], MatchBy::Rfc2396, &matchers)
        .expect("match");
    assert_eq!(calcs.len(), 1);
    assert_eq!(calcs[0].endpoint_reference(), "urn:uuid:a");

    let room2 = registry
        .match_by(&[], &["http://h/room/2".to_string()], MatchBy::Rfc2396, &matchers)
        .expect("match");
    assert_eq!(room2.len(), 1);
    assert_eq!(room2[0].endpoint_reference(), "urn:uuid:b");

    let none = registry
        .match_by(
            &[calc()],
            &["http://h/room/2".to_string()],
            MatchBy::Rfc2396,
            &matchers,
        )
        .expect("match");
    assert!(none.is_empty());
}

#[test]
fn test_match_by_ldap_fails() {
    let registry = ServiceRegistry::new();
    let err = registry
        .match_by(&[], &[], MatchBy::Ldap, &MatcherTable::default())
        .expect_err("ldap");
    assert!(matches!(err, Error::UnsupportedMatcher(MatchBy::Ldap)));
}

#[test]
fn test_match_all_is_snapshot() {
    let registry = ServiceRegistry::new();
    registry
        .store(make_service("urn:uuid:a", "http://a"))
        .expect("store");
    let snapshot = registry.match_all().expect("snapshot");

    registry
        .store(make_service("urn:uuid:b", "http://b"))
        .expect("store");
    registry.remove("urn:uuid:a").expect("remove");

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].endpoint_reference(), "urn:uuid:a");
}

#[test]
fn test_use_storage_with_and_without_migration() {
    let registry = ServiceRegistry::new();
    registry
        .store(make_service("urn:uuid:a", "http://a"))
        .expect("store");

    registry
        .use_storage(Box::new(MemoryStore::new()), true)
        .expect("swap");
    assert_eq!(registry.len(), 1);
    assert!(registry.contains("urn:uuid:a").expect("contains"));

    registry
        .use_storage(Box::new(MemoryStore::new()), false)
        .expect("swap");
    assert!(registry.is_empty());
}

#[test]
fn test_backend_errors_surface() {
    let registry = ServiceRegistry::with_store(Box::new(ReadOnlyStore));
    let err = registry
        .store(make_service("urn:uuid:a", "http://a"))
        .expect_err("read-only");
    assert!(matches!(err, Error::Registry(_)));
}

#[test]
fn test_failed_migration_keeps_old_store() {
    let registry = ServiceRegistry::new();
    registry
        .store(make_service("urn:uuid:a", "http://a"))
        .expect("store");
    assert!(registry.use_storage(Box::new(ReadOnlyStore), true).is_err());
    assert!(registry.contains("urn:uuid:a").expect("contains"));
}

#[test]
fn test_concurrent_store() {
    let registry = Arc::new(ServiceRegistry::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let ep = format!("urn:uuid:{}-{}", t, i % 25);
                    registry
                        .store(make_service(&ep, "http://a"))
                        .expect("store");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }
    assert_eq!(registry.len(), 8 * 25);
}
