// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery node: protocol state machine and public API.
//!
//! # Architecture
//!
//! ```text
//! publish/probe/resolve ---> DispatchCore ---> Transport.send()
//!                               ^   |
//!            wsd-dispatch loop  |   +--> local / remote ServiceRegistry
//!   (sync_proxy, dispatch())    |
//! Transport.recv_timeout() -----+
//! ```
//!
//! The loop thread realizes proxy toggles, then handles at most one
//! inbound message per iteration. Errors and panics raised while handling
//! a message are logged and never stop the loop.
//!
//! # Example
//!
//! ```no_run
//! use wsdisco::{DiscoveryConfig, DiscoveryNode, ProbeRequest, QName, ServiceDescription};
//! use std::time::Duration;
//!
//! # fn main() -> wsdisco::Result<()> {
//! let node = DiscoveryNode::builder(DiscoveryConfig::default()).build();
//! node.start()?;
//!
//! node.publish(
//!     ServiceDescription::with_random_endpoint()
//!         .with_type(QName::new("urn:example", "Calc"))
//!         .with_scope("http://example.com/lab")
//!         .with_xaddr("http://192.168.1.20:8080/calc"),
//! )?;
//!
//! let found = node.probe_wait(&ProbeRequest::any(), Duration::from_secs(2))?;
//! println!("{} service(s)", found.len());
//! node.done();
//! # Ok(())
//! # }
//! ```

mod handler;
mod proxy;
mod state;

pub use self::proxy::{proxy_type, ProxyUpstream, PROXY_TYPE_NAME};
pub use self::state::NodeState;

use self::handler::DispatchCore;
use self::state::StateCell;
use crate::config::{DiscoveryConfig, TransportKind};
use crate::error::{Error, Result};
use crate::matcher::MatcherTable;
use crate::protocol::{JsonCodec, MessageCodec};
use crate::registry::ServiceRegistry;
use crate::service::{ProbeRequest, ServiceDescription};
use crate::transport::{
    CompressedTransport, MemoryNetwork, QueuedTransport, StatsSnapshot, Transport,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Builds a fresh transport each time a node starts.
pub type TransportFactory =
    Box<dyn Fn(&DiscoveryConfig) -> Result<Box<dyn Transport>> + Send + Sync>;

/// Bound on how long `start()` waits for the loop to report Running.
const START_TIMEOUT: Duration = Duration::from_secs(10);

fn udp_factory() -> TransportFactory {
    Box::new(|config: &DiscoveryConfig| {
        let transport = QueuedTransport::bind(config)?;
        Ok(match config.transport {
            TransportKind::Plain => Box::new(transport) as Box<dyn Transport>,
            TransportKind::Compressed => Box::new(CompressedTransport::new(transport)),
        })
    })
}

fn memory_factory(network: MemoryNetwork) -> TransportFactory {
    Box::new(move |config: &DiscoveryConfig| {
        let transport = network.attach(config)?;
        Ok(match config.transport {
            TransportKind::Plain => Box::new(transport) as Box<dyn Transport>,
            TransportKind::Compressed => Box::new(CompressedTransport::new(transport)),
        })
    })
}

/// Builder for [`DiscoveryNode`].
pub struct DiscoveryNodeBuilder {
    config: DiscoveryConfig,
    codec: Arc<dyn MessageCodec>,
    matchers: MatcherTable,
    factory: TransportFactory,
}

impl DiscoveryNodeBuilder {
    /// Serializer for protocol messages (JSON by default).
    pub fn codec(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Scope matcher table (all built-in algorithms by default).
    pub fn matchers(mut self, matchers: MatcherTable) -> Self {
        self.matchers = matchers;
        self
    }

    /// Custom transport construction.
    pub fn transport_factory(mut self, factory: TransportFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Run on an in-process network instead of UDP.
    pub fn memory_network(self, network: &MemoryNetwork) -> Self {
        self.transport_factory(memory_factory(network.clone()))
    }

    pub fn build(self) -> DiscoveryNode {
        DiscoveryNode {
            core: Arc::new(DispatchCore::new(self.config, self.codec, self.matchers)),
            factory: self.factory,
            state: Arc::new(StateCell::default()),
            stop: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(()),
            thread: Mutex::new(None),
        }
    }
}

/// One WS-Discovery participant.
///
/// Holds the published ("local") and discovered ("remote") registries, the
/// duplicate filter and the dispatch loop. Published services are also
/// stored in the remote registry, so the directory always lists them.
pub struct DiscoveryNode {
    core: Arc<DispatchCore>,
    factory: TransportFactory,
    state: Arc<StateCell>,
    stop: Arc<AtomicBool>,
    lifecycle: Mutex<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryNode {
    /// Builder over UDP with the JSON codec.
    pub fn builder(config: DiscoveryConfig) -> DiscoveryNodeBuilder {
        DiscoveryNodeBuilder {
            config,
            codec: Arc::new(JsonCodec),
            matchers: MatcherTable::default(),
            factory: udp_factory(),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.core.config
    }

    pub fn state(&self) -> NodeState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state() == NodeState::Running
    }

    /// Bring up the transport and the dispatch loop.
    ///
    /// Blocks until the node is Running. Transport failures are returned
    /// and leave the node Stopped. Services published beforehand are
    /// announced once running.
    pub fn start(&self) -> Result<()> {
        let _guard = self.lifecycle.lock();
        if !self.state.transition(NodeState::Stopped, NodeState::Starting) {
            return Err(Error::InvalidState(format!(
                "cannot start while {}",
                self.state()
            )));
        }

        let transport: Arc<dyn Transport> = match self.start_transport() {
            Ok(transport) => transport,
            Err(e) => {
                log::warn!("[dispatch] start failed: {}", e);
                self.state.set(NodeState::Stopped);
                return Err(e);
            }
        };
        self.core.attach(Arc::clone(&transport));
        self.stop.store(false, Ordering::Release);

        let core = Arc::clone(&self.core);
        let state = Arc::clone(&self.state);
        let stop = Arc::clone(&self.stop);
        let spawned = thread::Builder::new()
            .name("wsd-dispatch".to_string())
            .spawn(move || run_loop(&core, &state, &stop));
        match spawned {
            Ok(handle) => *self.thread.lock() = Some(handle),
            Err(e) => {
                self.abort_start();
                return Err(Error::transport_init("spawn wsd-dispatch", e));
            }
        }

        let reached = self
            .state
            .wait_until(START_TIMEOUT, |s| s == NodeState::Running);
        if reached != NodeState::Running {
            self.abort_start();
            return Err(Error::InvalidState(format!(
                "dispatch loop stuck in {}",
                reached
            )));
        }

        log::info!("[dispatch] node running on {}", transport.local_addr());
        Ok(())
    }

    /// Undo a partial start: stop and join the loop, release the
    /// transport, back to Stopped.
    fn abort_start(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::warn!("[dispatch] loop thread panicked");
            }
        }
        if let Some(transport) = self.core.detach() {
            transport.done();
        }
        self.state.set(NodeState::Stopped);
        log::warn!("[dispatch] start aborted");
    }

    fn start_transport(&self) -> Result<Arc<dyn Transport>> {
        let transport: Arc<dyn Transport> = Arc::from((self.factory)(&self.core.config)?);
        transport.start()?;
        Ok(transport)
    }

    /// Say Bye for every published service, stop the loop, tear down the
    /// transport. No-op unless Running.
    pub fn done(&self) {
        let _guard = self.lifecycle.lock();
        if !self.state.transition(NodeState::Running, NodeState::Stopping) {
            return;
        }

        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::warn!("[dispatch] loop thread panicked");
            }
        }

        match self.core.local.match_all() {
            Ok(services) => {
                for service in &services {
                    if let Err(e) = self.core.send_bye(service) {
                        log::warn!(
                            "[dispatch] Bye for {} failed: {}",
                            service.endpoint_reference(),
                            e
                        );
                    }
                }
            }
            Err(e) => log::warn!("[dispatch] cannot list local services at shutdown: {}", e),
        }
        self.core.clear_proxy();

        if let Some(transport) = self.core.detach() {
            transport.done();
        }
        self.state.set(NodeState::Stopped);
        log::info!("[dispatch] node stopped");
    }

    // ---------------------------------------------------------------
    // Publishing
    // ---------------------------------------------------------------

    /// Publish a service; announced with Hello when running.
    ///
    /// Registry failures are returned to the caller.
    pub fn publish(&self, service: ServiceDescription) -> Result<()> {
        self.core.local.store(service.clone())?;
        self.core.remote.store(service.clone())?;
        if self.core.is_attached() {
            self.core.send_hello(&service)?;
        }
        Ok(())
    }

    /// Withdraw a published service; announced with Bye when running.
    ///
    /// `Ok(false)` if the endpoint was not published.
    pub fn unpublish(&self, endpoint: &str) -> Result<bool> {
        let Some(service) = self.core.local.find_service(endpoint)? else {
            return Ok(false);
        };
        self.core.local.remove(endpoint)?;
        self.core.remote.remove(endpoint)?;
        if self.core.is_attached() {
            self.core.send_bye(&service)?;
        }
        Ok(true)
    }

    pub fn unpublish_service(&self, service: &ServiceDescription) -> Result<bool> {
        self.unpublish(service.endpoint_reference())
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Send a Probe; answers land in [`DiscoveryNode::service_directory`].
    pub fn probe(&self, request: &ProbeRequest) -> Result<()> {
        self.core.send_probe(request)
    }

    /// Probe, wait `window`, return the matching directory entries.
    ///
    /// An empty result is not an error.
    pub fn probe_wait(
        &self,
        request: &ProbeRequest,
        window: Duration,
    ) -> Result<Vec<ServiceDescription>> {
        self.probe(request)?;
        thread::sleep(window);
        let by = request.match_by.unwrap_or(self.core.config.default_match_by);
        self.core
            .remote
            .match_by(&request.types, &request.scopes, by, &self.core.matchers)
    }

    /// Ask for the invocation addresses of `endpoint`.
    pub fn resolve(&self, endpoint: &str) -> Result<()> {
        self.core.send_resolve(endpoint)
    }

    /// Resolve, wait `window`, return the directory entry if known.
    pub fn resolve_wait(
        &self,
        endpoint: &str,
        window: Duration,
    ) -> Result<Option<ServiceDescription>> {
        self.resolve(endpoint)?;
        thread::sleep(window);
        self.core.remote.find_service(endpoint)
    }

    // ---------------------------------------------------------------
    // Proxy mode
    // ---------------------------------------------------------------

    /// Request proxy mode; realized by the next loop iteration.
    pub fn enable_proxy(&self) {
        self.core.proxy.lock().requested = true;
    }

    /// Leave proxy mode; the proxy service says Bye on the next iteration.
    pub fn disable_proxy(&self) {
        self.core.proxy.lock().requested = false;
    }

    pub fn is_proxy(&self) -> bool {
        self.core.proxy.lock().requested
    }

    /// The synthesized proxy service, once realized.
    pub fn proxy_service(&self) -> Option<ServiceDescription> {
        self.core.proxy.lock().service.clone()
    }

    /// Proxy this node was redirected to by a Suppression.
    pub fn using_proxy(&self) -> Option<ProxyUpstream> {
        self.core.proxy.lock().upstream.clone()
    }

    // ---------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------

    /// Services published by this node.
    pub fn local_services(&self) -> &ServiceRegistry {
        &self.core.local
    }

    /// Services known to this node, its own included.
    pub fn service_directory(&self) -> &ServiceRegistry {
        &self.core.remote
    }

    pub fn matchers(&self) -> &MatcherTable {
        &self.core.matchers
    }

    /// Unicast address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.core.transport().ok().map(|t| t.local_addr())
    }

    pub fn transport_stats(&self) -> Option<StatsSnapshot> {
        self.core.transport().ok().map(|t| t.stats())
    }
}

impl Drop for DiscoveryNode {
    fn drop(&mut self) {
        self.done();
    }
}

/// Dispatch loop body, one thread per running node.
fn run_loop(core: &DispatchCore, state: &StateCell, stop: &AtomicBool) {
    state.set(NodeState::Running);

    match core.local.match_all() {
        Ok(services) => {
            for service in &services {
                if let Err(e) = core.send_hello(service) {
                    log::warn!(
                        "[dispatch] Hello for {} failed: {}",
                        service.endpoint_reference(),
                        e
                    );
                }
            }
        }
        Err(e) => log::warn!("[dispatch] cannot list local services: {}", e),
    }

    let poll = core.config.dispatch_poll;
    while !stop.load(Ordering::Acquire) {
        let step = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            if let Err(e) = core.sync_proxy() {
                log::warn!("[proxy] mode change failed: {}", e);
            }
            core.dispatch(poll)
        }));

        match step {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("[dispatch] message dropped: {}", e),
            Err(_) => log::error!("[dispatch] handler panicked, continuing"),
        }
    }

    log::debug!("[dispatch] loop exited");
}

#[cfg(test)]
mod tests;
