// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message handling shared by the dispatch loop and the public API.

use super::proxy::{self, ProxyState, ProxyUpstream};
use crate::config::DiscoveryConfig;
use crate::dedup::DuplicateFilter;
use crate::error::{Error, Result};
use crate::matcher::MatcherTable;
use crate::message::NetworkMessage;
use crate::protocol::{AppSequence, Body, MessageCodec, ProtocolMessage};
use crate::registry::ServiceRegistry;
use crate::service::{ProbeRequest, ServiceDescription};
use crate::transport::Transport;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) struct DispatchCore {
    pub config: DiscoveryConfig,
    pub codec: Arc<dyn MessageCodec>,
    pub matchers: MatcherTable,
    pub local: ServiceRegistry,
    pub remote: ServiceRegistry,
    pub dedup: DuplicateFilter,
    pub proxy: Mutex<ProxyState>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    instance_id: AtomicU64,
    message_number: AtomicU64,
}

impl DispatchCore {
    pub fn new(
        config: DiscoveryConfig,
        codec: Arc<dyn MessageCodec>,
        matchers: MatcherTable,
    ) -> Self {
        let strict = config.strict_store;
        Self {
            dedup: DuplicateFilter::new(config.duplicate_history),
            local: ServiceRegistry::new().strict(strict),
            remote: ServiceRegistry::new(),
            proxy: Mutex::new(ProxyState::default()),
            transport: RwLock::new(None),
            instance_id: AtomicU64::new(0),
            message_number: AtomicU64::new(0),
            config,
            codec,
            matchers,
        }
    }

    // ---------------------------------------------------------------
    // Transport attachment
    // ---------------------------------------------------------------

    /// Install the running transport and open a new AppSequence instance.
    pub fn attach(&self, transport: Arc<dyn Transport>) {
        let instance = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.instance_id.store(instance, Ordering::Relaxed);
        self.message_number.store(0, Ordering::Relaxed);
        *self.transport.write() = Some(transport);
    }

    pub fn detach(&self) -> Option<Arc<dyn Transport>> {
        self.transport.write().take()
    }

    pub fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.transport
            .read()
            .clone()
            .ok_or_else(|| Error::InvalidState("node is not running".into()))
    }

    pub fn is_attached(&self) -> bool {
        self.transport.read().is_some()
    }

    fn next_app_sequence(&self) -> AppSequence {
        AppSequence {
            instance_id: self.instance_id.load(Ordering::Relaxed),
            sequence_id: None,
            message_number: self.message_number.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    // ---------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------

    /// Assign a fresh id, remember it, encode and queue for `dst`.
    fn send_to(&self, mut message: ProtocolMessage, dst: SocketAddr) -> Result<()> {
        let transport = self.transport()?;
        let id = message.renew_id().to_owned();
        self.dedup.register_received(&id);

        if dst == transport.multicast_addr() {
            message.to = Some(self.config.version.multicast_to().to_owned());
        }
        let payload = self.codec.serialize(&message)?;
        log::debug!(
            "[dispatch] {} {} -> {} ({} bytes)",
            message.action(),
            id,
            dst,
            payload.len()
        );
        transport.send(NetworkMessage::new(payload, transport.local_addr(), dst), false)
    }

    fn send_multicast(&self, message: ProtocolMessage) -> Result<()> {
        let dst = self.transport()?.multicast_addr();
        self.send_to(message, dst)
    }

    /// Multicast, or unicast to the proxy we were redirected to.
    fn send_query(&self, message: ProtocolMessage) -> Result<()> {
        let upstream = self.proxy.lock().upstream.as_ref().map(|up| up.addr);
        match upstream {
            Some(addr) => self.send_to(message, addr),
            None => self.send_multicast(message),
        }
    }

    pub fn send_hello(&self, service: &ServiceDescription) -> Result<()> {
        let message = ProtocolMessage::new(Body::Hello(service.clone()))
            .with_app_sequence(self.next_app_sequence());
        self.send_multicast(message)
    }

    pub fn send_bye(&self, service: &ServiceDescription) -> Result<()> {
        let message = ProtocolMessage::new(Body::Bye(service.clone()))
            .with_app_sequence(self.next_app_sequence());
        self.send_multicast(message)
    }

    pub fn send_probe(&self, request: &ProbeRequest) -> Result<()> {
        self.send_query(ProtocolMessage::new(Body::Probe(request.clone())))
    }

    pub fn send_resolve(&self, endpoint: &str) -> Result<()> {
        self.send_query(ProtocolMessage::new(Body::Resolve(endpoint.to_owned())))
    }

    // ---------------------------------------------------------------
    // Proxy realization
    // ---------------------------------------------------------------

    /// Create or retire the proxy service to follow the requested mode.
    ///
    /// Runs under the proxy lock so both registries change together.
    pub fn sync_proxy(&self) -> Result<()> {
        let mut proxy = self.proxy.lock();
        if proxy.requested && proxy.service.is_none() {
            let transport = self.transport()?;
            let service = proxy::synthesize(
                self.config.version,
                transport.local_addr(),
                self.config.proxy_xaddr.as_deref(),
            );
            self.local.store(service.clone())?;
            if let Err(e) = self.remote.store(service.clone()) {
                let _ = self.local.remove_service(&service);
                return Err(e);
            }
            log::info!(
                "[proxy] enabled as {} ({:?})",
                service.endpoint_reference(),
                service.xaddrs
            );
            proxy.service = Some(service.clone());
            drop(proxy);
            self.send_hello(&service)?;
        } else if !proxy.requested {
            if let Some(service) = proxy.service.take() {
                self.local.remove_service(&service)?;
                self.remote.remove_service(&service)?;
                log::info!("[proxy] disabled ({})", service.endpoint_reference());
                drop(proxy);
                self.send_bye(&service)?;
            }
        }
        Ok(())
    }

    /// Drop proxy state at shutdown; the Bye went out with the local services.
    pub fn clear_proxy(&self) {
        let mut proxy = self.proxy.lock();
        if let Some(service) = proxy.service.take() {
            let _ = self.local.remove_service(&service);
            let _ = self.remote.remove_service(&service);
        }
        proxy.upstream = None;
    }

    // ---------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------

    /// Receive and process at most one message.
    pub fn dispatch(&self, timeout: Duration) -> Result<()> {
        let transport = self.transport()?;
        match transport.recv_timeout(timeout) {
            Some(message) => self.handle(&message, transport.multicast_addr()),
            None => Ok(()),
        }
    }

    /// Decode, deduplicate and apply one inbound datagram.
    pub fn handle(&self, datagram: &NetworkMessage, multicast_addr: SocketAddr) -> Result<()> {
        let message = self.codec.deserialize(datagram.payload())?;
        if self.dedup.check_and_register(message.message_id.as_deref())? {
            log::debug!(
                "[dispatch] duplicate {} {:?} from {} dropped",
                message.action(),
                message.message_id,
                datagram.src()
            );
            return Ok(());
        }

        let src = datagram.src();
        let multicast = datagram.dst() == multicast_addr;
        log::debug!(
            "[dispatch] {} from {} ({})",
            message.action(),
            src,
            if multicast { "multicast" } else { "unicast" }
        );

        let relates_to = message.message_id.clone();
        match message.body {
            Body::Hello(service) => self.on_hello(service, relates_to, src, multicast),
            Body::Bye(service) => self.on_bye(&service),
            Body::Probe(request) => self.on_probe(&request, relates_to, src, multicast),
            Body::ProbeMatches(services) => {
                for service in services {
                    self.remote.store(service)?;
                }
                Ok(())
            }
            Body::Resolve(endpoint) => self.on_resolve(&endpoint, relates_to, src, multicast),
            Body::ResolveMatches(service) => {
                if !self.remote.update(&service)? {
                    self.remote.store(service)?;
                }
                Ok(())
            }
            Body::Suppression(service) => self.on_suppression(service, src),
        }
    }

    /// Store the announcement; a proxy redirects multicast announcers.
    fn on_hello(
        &self,
        service: ServiceDescription,
        relates_to: Option<String>,
        src: SocketAddr,
        multicast: bool,
    ) -> Result<()> {
        self.remote.store(service)?;
        if !multicast {
            return Ok(());
        }
        if let Some(proxy_service) = self.proxy_role() {
            let suppression = ProtocolMessage::new(Body::Suppression(proxy_service))
                .with_relates_to(relates_to)
                .with_app_sequence(self.next_app_sequence());
            self.send_to(suppression, src)?;
        }
        Ok(())
    }

    fn on_bye(&self, service: &ServiceDescription) -> Result<()> {
        self.remote.remove_service(service)?;
        let mut proxy = self.proxy.lock();
        if proxy.is_upstream(service.endpoint_reference()) {
            log::info!(
                "[proxy] upstream {} left, back to multicast",
                service.endpoint_reference()
            );
            proxy.upstream = None;
        }
        Ok(())
    }

    /// Own proxy service while acting as a proxy.
    fn proxy_role(&self) -> Option<ServiceDescription> {
        self.proxy.lock().service.clone()
    }

    fn on_probe(
        &self,
        request: &ProbeRequest,
        relates_to: Option<String>,
        src: SocketAddr,
        multicast: bool,
    ) -> Result<()> {
        let proxy_service = self.proxy_role();
        let by = request.match_by.unwrap_or(self.config.default_match_by);

        // A proxy answers directed probes from everything it knows.
        let registry = match (&proxy_service, multicast) {
            (Some(_), false) => &self.remote,
            _ => &self.local,
        };
        let matches = registry.match_by(&request.types, &request.scopes, by, &self.matchers)?;

        if !matches.is_empty() {
            let reply = ProtocolMessage::new(Body::ProbeMatches(matches))
                .with_relates_to(relates_to.clone())
                .with_app_sequence(self.next_app_sequence());
            self.send_to(reply, src)?;
        }

        if let (Some(service), true) = (proxy_service, multicast) {
            let suppression = ProtocolMessage::new(Body::Suppression(service))
                .with_relates_to(relates_to)
                .with_app_sequence(self.next_app_sequence());
            self.send_to(suppression, src)?;
        }
        Ok(())
    }

    fn on_resolve(
        &self,
        endpoint: &str,
        relates_to: Option<String>,
        src: SocketAddr,
        multicast: bool,
    ) -> Result<()> {
        let mut found = self.local.find_service(endpoint)?;
        if found.is_none() && !multicast && self.proxy_role().is_some() {
            found = self.remote.find_service(endpoint)?;
        }
        let Some(service) = found else {
            return Ok(());
        };

        let reply = ProtocolMessage::new(Body::ResolveMatches(service))
            .with_relates_to(relates_to)
            .with_app_sequence(self.next_app_sequence());
        self.send_to(reply, src)
    }

    fn on_suppression(&self, service: ServiceDescription, src: SocketAddr) -> Result<()> {
        {
            let mut proxy = self.proxy.lock();
            if proxy.service.is_some() {
                // Another proxy on the segment; keep serving our own clients.
                return Ok(());
            }
            log::info!(
                "[proxy] suppressed by {} at {}, switching to unicast",
                service.endpoint_reference(),
                src
            );
            proxy.upstream = Some(ProxyUpstream {
                endpoint_reference: service.endpoint_reference().to_owned(),
                addr: src,
            });
        }
        self.remote.store(service)
    }
}
