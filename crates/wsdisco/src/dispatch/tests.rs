// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::config::RetryConfig;
use crate::message::NetworkMessage;
use crate::protocol::{Body, ProtocolMessage};
use crate::service::QName;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Instant;

fn fast_config() -> DiscoveryConfig {
    DiscoveryConfig::default()
        .with_retry(RetryConfig::default().with_repeats(1, 1).with_delays(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4),
        ))
        .with_timeouts(Duration::from_millis(20), Duration::from_millis(20))
}

fn memory_node(net: &MemoryNetwork) -> DiscoveryNode {
    DiscoveryNode::builder(fast_config())
        .memory_network(net)
        .build()
}

fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn printer() -> ServiceDescription {
    ServiceDescription::new("urn:uuid:printer-1")
        .with_type(QName::new("urn:example", "Printer"))
        .with_scope("http://example.com/floor1/room2")
        .with_xaddr("http://10.0.0.5:8080/print")
}

fn knows(node: &DiscoveryNode, endpoint: &str) -> bool {
    node.service_directory().contains(endpoint).unwrap_or(false)
}

fn datagram(message: &ProtocolMessage, multicast: SocketAddr) -> NetworkMessage {
    let payload = JsonCodec.serialize(message).expect("serialize");
    let src = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 45_000);
    NetworkMessage::new(payload, src, multicast)
}

fn detached_core() -> DispatchCore {
    DispatchCore::new(fast_config(), Arc::new(JsonCodec), MatcherTable::default())
}

#[test]
fn test_lifecycle_transitions() {
    let net = MemoryNetwork::new();
    let node = memory_node(&net);
    assert_eq!(node.state(), NodeState::Stopped);
    assert!(node.local_addr().is_none());

    node.start().expect("start");
    assert_eq!(node.state(), NodeState::Running);
    assert!(node.local_addr().is_some());
    assert!(matches!(node.start(), Err(Error::InvalidState(_))));

    node.done();
    assert_eq!(node.state(), NodeState::Stopped);
    assert!(node.local_addr().is_none());
    node.done();
    assert_eq!(node.state(), NodeState::Stopped);

    node.start().expect("restart");
    assert!(node.is_running());
    node.done();
    assert_eq!(net.endpoint_count(), 0);
}

#[test]
fn test_aborted_start_releases_loop_and_transport() {
    let net = MemoryNetwork::new();
    let node = memory_node(&net);
    node.start().expect("start");
    assert_eq!(net.endpoint_count(), 1);

    // Same teardown as a start that never reached Running.
    node.abort_start();
    assert_eq!(node.state(), NodeState::Stopped);
    assert!(node.local_addr().is_none());
    assert!(node.thread.lock().is_none());
    assert_eq!(net.endpoint_count(), 0);

    node.start().expect("restart after abort");
    assert!(node.is_running());
    node.done();
    assert_eq!(node.state(), NodeState::Stopped);
}

#[test]
fn test_failed_transport_leaves_node_stopped() {
    let node = DiscoveryNode::builder(fast_config())
        .transport_factory(Box::new(
            |_: &DiscoveryConfig| -> Result<Box<dyn Transport>> {
                Err(Error::Config("no network".into()))
            },
        ))
        .build();
    assert!(matches!(node.start(), Err(Error::Config(_))));
    assert_eq!(node.state(), NodeState::Stopped);
}

#[test]
fn test_publish_before_start_is_announced_at_start() {
    let net = MemoryNetwork::new();
    let observer = memory_node(&net);
    observer.start().expect("start");

    let node = memory_node(&net);
    node.publish(printer()).expect("publish");
    assert!(node.local_services().contains("urn:uuid:printer-1").expect("contains"));
    assert!(knows(&node, "urn:uuid:printer-1"));
    assert!(!knows(&observer, "urn:uuid:printer-1"));

    node.start().expect("start");
    assert!(wait_for(Duration::from_secs(2), || knows(&observer, "urn:uuid:printer-1")));

    node.done();
    observer.done();
}

#[test]
fn test_probe_reply_fills_directory() {
    let net = MemoryNetwork::new();
    let server = memory_node(&net);
    server.publish(printer()).expect("publish");
    server.start().expect("start");

    let client = memory_node(&net);
    client.start().expect("start");
    assert!(!knows(&client, "urn:uuid:printer-1"));

    let probe = ProbeRequest::any()
        .with_type(QName::new("urn:example", "Printer"))
        .with_scope("http://example.com/floor1");
    client.probe(&probe).expect("probe");
    assert!(wait_for(Duration::from_secs(2), || knows(&client, "urn:uuid:printer-1")));

    let found = client
        .service_directory()
        .find_service("urn:uuid:printer-1")
        .expect("find")
        .expect("entry");
    assert_eq!(found.xaddrs, vec!["http://10.0.0.5:8080/print".to_string()]);

    client.done();
    server.done();
}

#[test]
fn test_probe_for_other_type_gets_no_reply() {
    let net = MemoryNetwork::new();
    let server = memory_node(&net);
    server.publish(printer()).expect("publish");
    server.start().expect("start");

    let client = memory_node(&net);
    client.start().expect("start");
    let found = client
        .probe_wait(
            &ProbeRequest::any().with_type(QName::new("urn:example", "Scanner")),
            Duration::from_millis(200),
        )
        .expect("probe");
    assert!(found.is_empty());
    assert!(!knows(&client, "urn:uuid:printer-1"));

    client.done();
    server.done();
}

#[test]
fn test_unpublish_sends_bye() {
    let net = MemoryNetwork::new();
    let observer = memory_node(&net);
    observer.start().expect("start");
    let node = memory_node(&net);
    node.start().expect("start");

    node.publish(printer()).expect("publish");
    assert!(wait_for(Duration::from_secs(2), || knows(&observer, "urn:uuid:printer-1")));

    assert!(node.unpublish("urn:uuid:printer-1").expect("unpublish"));
    assert!(!node.unpublish("urn:uuid:printer-1").expect("unpublish again"));
    assert!(!knows(&node, "urn:uuid:printer-1"));
    assert!(wait_for(Duration::from_secs(2), || !knows(&observer, "urn:uuid:printer-1")));

    node.done();
    observer.done();
}

#[test]
fn test_done_says_bye_for_published_services() {
    let net = MemoryNetwork::new();
    let observer = memory_node(&net);
    observer.start().expect("start");
    let node = memory_node(&net);
    node.publish(printer()).expect("publish");
    node.start().expect("start");
    assert!(wait_for(Duration::from_secs(2), || knows(&observer, "urn:uuid:printer-1")));

    node.done();
    assert!(wait_for(Duration::from_secs(2), || !knows(&observer, "urn:uuid:printer-1")));
    // Published services survive a restart.
    assert!(node.local_services().contains("urn:uuid:printer-1").expect("contains"));

    observer.done();
}

#[test]
fn test_malformed_datagram_does_not_stop_loop() {
    let net = MemoryNetwork::new();
    let config = fast_config();
    let node = memory_node(&net);
    node.start().expect("start");

    let raw = net.attach(&config).expect("attach");
    raw.start().expect("start");
    let junk: [&[u8]; 3] = [b"\x00\x01garbage", b"{\"message_id\":", b"{}"];
    for junk in junk {
        let msg = NetworkMessage::new(
            junk.to_vec(),
            raw.local_addr(),
            config.multicast_socket_addr(),
        );
        raw.send(msg, true).expect("send");
    }

    let hello = ProtocolMessage::new(Body::Hello(printer()));
    let payload = JsonCodec.serialize(&hello).expect("serialize");
    raw.send(
        NetworkMessage::new(payload, raw.local_addr(), config.multicast_socket_addr()),
        true,
    )
    .expect("send");

    assert!(wait_for(Duration::from_secs(2), || knows(&node, "urn:uuid:printer-1")));
    assert!(node.is_running());

    raw.done();
    node.done();
}

#[test]
fn test_handle_rejects_unparseable_and_anonymous_messages() {
    let core = detached_core();
    let multicast = core.config.multicast_socket_addr();
    let src = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 45_000);

    let junk = NetworkMessage::new(b"not json".to_vec(), src, multicast);
    let err = core.handle(&junk, multicast).expect_err("parse");
    assert!(matches!(err, Error::Parse(_)));
    assert!(err.is_recoverable());

    let mut anonymous = ProtocolMessage::new(Body::Hello(printer()));
    anonymous.message_id = None;
    let err = core
        .handle(&datagram(&anonymous, multicast), multicast)
        .expect_err("anonymous");
    assert!(matches!(err, Error::MissingMessageId));
    assert!(core.remote.is_empty());
}

#[test]
fn test_duplicate_message_processed_once() {
    let core = detached_core();
    let multicast = core.config.multicast_socket_addr();
    let hello = datagram(&ProtocolMessage::new(Body::Hello(printer())), multicast);

    core.handle(&hello, multicast).expect("first");
    assert!(core.remote.contains("urn:uuid:printer-1").expect("contains"));

    core.remote.remove("urn:uuid:printer-1").expect("remove");
    core.handle(&hello, multicast).expect("duplicate");
    assert!(!core.remote.contains("urn:uuid:printer-1").expect("contains"));
}

#[test]
fn test_resolve_matches_updates_directory_entry() {
    let core = detached_core();
    let multicast = core.config.multicast_socket_addr();
    core.remote.store(printer()).expect("store");
    let before = core.remote.len();

    let moved = printer()
        .with_xaddr("http://10.0.0.6:8080/print")
        .with_metadata_version(2);
    let reply = ProtocolMessage::new(Body::ResolveMatches(moved));
    core.handle(&datagram(&reply, multicast), multicast)
        .expect("handle");

    let entry = core
        .remote
        .find_service("urn:uuid:printer-1")
        .expect("find")
        .expect("entry");
    assert_eq!(entry.metadata_version, 2);
    assert_eq!(entry.xaddrs.len(), 2);
    assert_eq!(core.remote.len(), before);

    let unknown = ServiceDescription::new("urn:uuid:other").with_xaddr("http://10.0.0.7/");
    let reply = ProtocolMessage::new(Body::ResolveMatches(unknown));
    core.handle(&datagram(&reply, multicast), multicast)
        .expect("handle");
    assert!(core.remote.contains("urn:uuid:other").expect("contains"));
}

#[test]
fn test_matching_probe_without_transport_reports_state_error() {
    let core = detached_core();
    let multicast = core.config.multicast_socket_addr();
    core.local.store(printer()).expect("store");

    let probe = ProtocolMessage::new(Body::Probe(ProbeRequest::any()));
    let err = core
        .handle(&datagram(&probe, multicast), multicast)
        .expect_err("no transport");
    assert!(matches!(err, Error::InvalidState(_)));
}

#[test]
fn test_proxy_enable_and_disable() {
    let net = MemoryNetwork::new();
    let observer = memory_node(&net);
    observer.start().expect("start");
    let node = memory_node(&net);
    node.start().expect("start");

    node.enable_proxy();
    assert!(node.is_proxy());
    assert!(wait_for(Duration::from_secs(2), || node.proxy_service().is_some()));

    let service = node.proxy_service().expect("proxy service");
    let endpoint = service.endpoint_reference().to_owned();
    assert!(!service.xaddrs.is_empty());
    assert!(service
        .types
        .contains(&proxy_type(node.config().version)));
    assert!(node.local_services().contains(&endpoint).expect("contains"));
    assert!(knows(&node, &endpoint));
    assert!(wait_for(Duration::from_secs(2), || knows(&observer, &endpoint)));

    node.disable_proxy();
    assert!(wait_for(Duration::from_secs(2), || node.proxy_service().is_none()));
    assert!(!node.local_services().contains(&endpoint).expect("contains"));
    assert!(!knows(&node, &endpoint));
    assert!(wait_for(Duration::from_secs(2), || !knows(&observer, &endpoint)));

    node.done();
    observer.done();
}

#[test]
fn test_proxy_redirects_multicast_announcer() {
    let net = MemoryNetwork::new();
    let proxy = memory_node(&net);
    proxy.start().expect("start");
    proxy.enable_proxy();
    assert!(wait_for(Duration::from_secs(2), || proxy.proxy_service().is_some()));

    let device = memory_node(&net);
    device.start().expect("start");
    assert!(device.using_proxy().is_none());

    device.publish(printer()).expect("publish");
    assert!(wait_for(Duration::from_secs(2), || knows(&proxy, "urn:uuid:printer-1")));
    assert!(wait_for(Duration::from_secs(2), || device.using_proxy().is_some()));
    assert_eq!(
        device.using_proxy().expect("upstream").addr,
        proxy.local_addr().expect("proxy addr")
    );

    device.done();
    proxy.done();
}

#[test]
fn test_suppression_redirects_client_until_proxy_leaves() {
    let net = MemoryNetwork::new();
    let proxy = memory_node(&net);
    proxy.start().expect("start");
    proxy.enable_proxy();
    assert!(wait_for(Duration::from_secs(2), || proxy.proxy_service().is_some()));
    let proxy_addr = proxy.local_addr().expect("proxy addr");

    let client = memory_node(&net);
    client.start().expect("start");
    assert!(client.using_proxy().is_none());

    client.probe(&ProbeRequest::any()).expect("probe");
    assert!(wait_for(Duration::from_secs(2), || client.using_proxy().is_some()));
    let upstream = client.using_proxy().expect("upstream");
    assert_eq!(upstream.addr, proxy_addr);

    proxy.done();
    assert!(wait_for(Duration::from_secs(2), || client.using_proxy().is_none()));

    client.done();
}
