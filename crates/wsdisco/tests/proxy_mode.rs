// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure

//! Discovery proxy tests
//!
//! A proxy advertises itself, answers multicast probes with a
//! Suppression and serves redirected clients over unicast.

use std::thread;
use std::time::{Duration, Instant};
use wsdisco::dispatch::proxy_type;
use wsdisco::{
    DiscoveryConfig, DiscoveryNode, MemoryNetwork, ProbeRequest, ProtocolVersion, QName,
    RetryConfig, ServiceDescription,
};

const WAIT: Duration = Duration::from_secs(3);

fn fast_config() -> DiscoveryConfig {
    DiscoveryConfig::default()
        .with_retry(RetryConfig::default().with_repeats(1, 1).with_delays(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4),
        ))
        .with_timeouts(Duration::from_millis(20), Duration::from_millis(20))
}

fn node_on(net: &MemoryNetwork, config: DiscoveryConfig) -> DiscoveryNode {
    let _ = env_logger::builder().is_test(true).try_init();
    let node = DiscoveryNode::builder(config).memory_network(net).build();
    node.start().expect("start node");
    node
}

fn poll_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn knows(node: &DiscoveryNode, endpoint: &str) -> bool {
    node.service_directory().contains(endpoint).unwrap_or(false)
}

fn start_proxy(net: &MemoryNetwork, config: DiscoveryConfig) -> DiscoveryNode {
    let proxy = node_on(net, config);
    proxy.enable_proxy();
    assert!(poll_until(|| proxy.proxy_service().is_some()));
    proxy
}

#[test]
fn test_proxy_service_is_registered_with_xaddr() {
    let net = MemoryNetwork::new();
    let proxy = start_proxy(&net, fast_config());

    let service = proxy.proxy_service().expect("proxy service");
    let endpoint = service.endpoint_reference();
    let addr = proxy.local_addr().expect("addr");
    assert_eq!(service.xaddrs, vec![format!("soap.udp://{}", addr)]);
    assert!(service.types.contains(&proxy_type(ProtocolVersion::Wsd2005)));

    let local = proxy
        .local_services()
        .find_service(endpoint)
        .expect("find")
        .expect("local entry");
    let directory = proxy
        .service_directory()
        .find_service(endpoint)
        .expect("find")
        .expect("directory entry");
    assert!(!local.xaddrs.is_empty());
    assert_eq!(local, directory);

    proxy.done();
    assert!(proxy.proxy_service().is_none());
}

#[test]
fn test_configured_proxy_xaddr_is_advertised() {
    let net = MemoryNetwork::new();
    let config = fast_config()
        .with_version(ProtocolVersion::Wsd11)
        .with_retry(fast_config().retry)
        .with_proxy_xaddr("soap.udp://proxy.example.com:3702");
    let proxy = start_proxy(&net, config);

    let service = proxy.proxy_service().expect("proxy service");
    assert_eq!(service.xaddrs, vec!["soap.udp://proxy.example.com:3702".to_string()]);
    assert!(service.types.contains(&proxy_type(ProtocolVersion::Wsd11)));

    proxy.done();
}

#[test]
fn test_disable_proxy_says_bye() {
    let net = MemoryNetwork::new();
    let observer = node_on(&net, fast_config());
    let proxy = start_proxy(&net, fast_config());
    let endpoint = proxy
        .proxy_service()
        .expect("proxy service")
        .endpoint_reference()
        .to_owned();
    assert!(poll_until(|| knows(&observer, &endpoint)));

    proxy.disable_proxy();
    assert!(!proxy.is_proxy());
    assert!(poll_until(|| proxy.proxy_service().is_none()));
    assert!(!proxy.local_services().contains(&endpoint).expect("contains"));
    assert!(poll_until(|| !knows(&observer, &endpoint)));

    proxy.done();
    observer.done();
}

#[test]
fn test_suppressed_client_probes_proxy_directory() {
    let net = MemoryNetwork::new();
    let proxy = start_proxy(&net, fast_config());

    // Announced before the client exists; only the proxy saw the Hello.
    let device = node_on(&net, fast_config());
    device
        .publish(
            ServiceDescription::new("urn:uuid:thermostat")
                .with_type(QName::new("urn:example:hvac", "Thermostat"))
                .with_xaddr("http://10.2.0.9/hvac"),
        )
        .expect("publish");
    assert!(poll_until(|| knows(&proxy, "urn:uuid:thermostat")));

    let client = node_on(&net, fast_config());
    client.probe(&ProbeRequest::any()).expect("probe");
    assert!(poll_until(|| client.using_proxy().is_some()));
    let upstream = client.using_proxy().expect("upstream");
    assert_eq!(Some(upstream.addr), proxy.local_addr());
    assert!(poll_until(|| knows(&client, &upstream.endpoint_reference)));
    assert!(poll_until(|| knows(&client, "urn:uuid:thermostat")));

    // The device goes quiet; only the proxy can still answer for it.
    device
        .local_services()
        .remove("urn:uuid:thermostat")
        .expect("remove");
    client
        .service_directory()
        .remove("urn:uuid:thermostat")
        .expect("remove");

    let thermostats = ProbeRequest::any().with_type(QName::new("urn:example:hvac", "Thermostat"));
    client.probe(&thermostats).expect("unicast probe");
    assert!(poll_until(|| knows(&client, "urn:uuid:thermostat")));

    client
        .service_directory()
        .remove("urn:uuid:thermostat")
        .expect("remove");
    let resolved = client
        .resolve_wait("urn:uuid:thermostat", Duration::from_millis(300))
        .expect("resolve")
        .expect("resolved through proxy");
    assert_eq!(resolved.xaddrs, vec!["http://10.2.0.9/hvac".to_string()]);

    proxy.done();
    assert!(poll_until(|| client.using_proxy().is_none()));

    client.done();
    device.done();
}

#[test]
fn test_proxy_ignores_foreign_suppression() {
    let net = MemoryNetwork::new();
    let first = start_proxy(&net, fast_config());
    let second = start_proxy(&net, fast_config());

    second.probe(&ProbeRequest::any()).expect("probe");
    let first_endpoint = first
        .proxy_service()
        .expect("proxy service")
        .endpoint_reference()
        .to_owned();
    assert!(poll_until(|| knows(&second, &first_endpoint)));
    thread::sleep(Duration::from_millis(100));
    assert!(second.using_proxy().is_none());

    second.done();
    first.done();
}
