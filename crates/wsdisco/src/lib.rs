// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # wsdisco - WS-Discovery protocol engine
//!
//! Peer-to-peer service discovery over UDP: nodes announce services
//! (Hello/Bye), query for them (Probe/ProbeMatches) and resolve invocation
//! addresses (Resolve/ResolveMatches), using multicast for discovery and
//! unicast for directed replies. An optional proxy role redirects peers to
//! unicast (Suppression).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wsdisco::{DiscoveryConfig, DiscoveryNode, ProbeRequest, QName, Result};
//! use std::time::Duration;
//!
//! fn main() -> Result<()> {
//!     let node = DiscoveryNode::builder(DiscoveryConfig::default().with_env_overrides()).build();
//!     node.start()?;
//!
//!     let probe = ProbeRequest::any().with_type(QName::new("urn:example", "Printer"));
//!     for service in node.probe_wait(&probe, Duration::from_secs(2))? {
//!         println!("{} at {:?}", service.endpoint_reference(), service.xaddrs);
//!     }
//!
//!     node.done();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                           DiscoveryNode                              |
//! |   publish | unpublish | probe | resolve | enable/disable proxy       |
//! +---------------------------------------------------------------------+
//! |        Dispatch loop: dedup -> handle action -> registries           |
//! |   ServiceRegistry (local, remote) | MatcherTable | DuplicateFilter   |
//! +---------------------------------------------------------------------+
//! |                MessageCodec (JSON built in, pluggable)               |
//! +---------------------------------------------------------------------+
//! |   QueuedTransport: 2 receivers + 2 retrying senders (UDP / memory)   |
//! |   CompressedTransport: zlib decorator                                |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DiscoveryNode`] | Protocol engine and public API |
//! | [`DiscoveryConfig`] | Per-node configuration (addresses, timing, matcher default) |
//! | [`ServiceDescription`] | Endpoint reference, types, scopes, invocation addresses |
//! | [`ServiceRegistry`] | Thread-safe directory over a swappable store |
//! | [`Transport`] | Datagram transport seam |
//! | [`MessageCodec`] | Serializer seam |
//!
//! ## Environment
//!
//! [`DiscoveryConfig::with_env_overrides`] reads `WSDISCO_MULTICAST_IF`,
//! `WSDISCO_MULTICAST_TTL`, `WSDISCO_UNICAST_PORT` and `WSDISCO_COMPRESS`.
//! Logging goes through the `log` facade; installing a logger is up to the
//! application.

pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod transport;

pub use config::{DiscoveryConfig, ProtocolVersion, RetryConfig, TransportKind};
pub use dedup::DuplicateFilter;
pub use dispatch::{DiscoveryNode, DiscoveryNodeBuilder, NodeState, ProxyUpstream};
pub use error::{Error, Result};
pub use matcher::{MatchBy, MatcherTable, ScopeMatcher};
pub use message::NetworkMessage;
pub use protocol::{Action, Body, JsonCodec, MessageCodec, ProtocolMessage};
pub use registry::{MemoryStore, ServiceRegistry, ServiceStore};
pub use service::{ProbeRequest, QName, ServiceDescription};
pub use transport::{CompressedTransport, MemoryNetwork, QueuedTransport, Transport};
