// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Proxy mode bookkeeping.
//!
//! Server side: `requested` is flipped by `enable_proxy`/`disable_proxy`
//! and realized by the dispatch loop, which creates or retires `service`.
//! Client side: a Suppression from a proxy sets `upstream`; Probe and
//! Resolve then go unicast to it until the proxy says Bye.

use crate::config::ProtocolVersion;
use crate::service::{QName, ServiceDescription};
use std::net::SocketAddr;

/// Local name of the port type advertised by a discovery proxy.
pub const PROXY_TYPE_NAME: &str = "DiscoveryProxy";

/// Proxy we were redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyUpstream {
    pub endpoint_reference: String,
    pub addr: SocketAddr,
}

#[derive(Debug, Default)]
pub(crate) struct ProxyState {
    pub requested: bool,
    pub service: Option<ServiceDescription>,
    pub upstream: Option<ProxyUpstream>,
}

impl ProxyState {
    /// True if `endpoint` is the proxy this node currently uses.
    pub fn is_upstream(&self, endpoint: &str) -> bool {
        self.upstream
            .as_ref()
            .is_some_and(|up| up.endpoint_reference == endpoint)
    }
}

/// Port type of a discovery proxy under `version`.
pub fn proxy_type(version: ProtocolVersion) -> QName {
    QName::new(version.namespace(), PROXY_TYPE_NAME)
}

/// Build the proxy's own service description.
///
/// `xaddr` overrides the advertised invocation address; otherwise the
/// node's unicast address is used.
pub(crate) fn synthesize(
    version: ProtocolVersion,
    local_addr: SocketAddr,
    xaddr: Option<&str>,
) -> ServiceDescription {
    let xaddr = match xaddr {
        Some(xaddr) => xaddr.to_owned(),
        None => format!("soap.udp://{}", local_addr),
    };
    ServiceDescription::with_random_endpoint()
        .with_type(proxy_type(version))
        .with_xaddr(xaddr)
}
