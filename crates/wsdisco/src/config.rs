// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery configuration - protocol constants and per-node settings.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: protocol constants (multicast group, port, SOAP-over-UDP timing)
//! - **Level 2 (Per node)**: [`DiscoveryConfig`], passed explicitly to the transport and
//!   the dispatch engine. There is no process-wide mutable configuration, so several
//!   nodes with different settings can live in one process.
//!
//! # Example
//!
//! ```
//! use wsdisco::config::{DiscoveryConfig, ProtocolVersion, TransportKind};
//!
//! let config = DiscoveryConfig::default()
//!     .with_version(ProtocolVersion::Wsd11)
//!     .with_transport(TransportKind::Compressed)
//!     .with_duplicate_history(500);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.retry.multicast_repeats, 2);
//! ```

use crate::error::{Error, Result};
use crate::matcher::MatchBy;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

// =======================================================================
// SOAP-over-UDP / WS-Discovery constants
// =======================================================================

/// Well-known discovery multicast group (239.255.255.250).
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Well-known discovery port (IANA "ws-discovery", 3702).
pub const MULTICAST_PORT: u16 = 3702;

/// Default multicast TTL (link-local only).
pub const DEFAULT_MULTICAST_TTL: u32 = 1;

/// SOAP-over-UDP UNICAST_UDP_REPEAT (2005/04 profile).
pub const UNICAST_UDP_REPEAT: u32 = 2;

/// SOAP-over-UDP MULTICAST_UDP_REPEAT (2005/04 profile).
pub const MULTICAST_UDP_REPEAT: u32 = 4;

/// UNICAST_UDP_REPEAT for the 1.1 profile.
pub const UNICAST_UDP_REPEAT_V11: u32 = 1;

/// MULTICAST_UDP_REPEAT for the 1.1 profile.
pub const MULTICAST_UDP_REPEAT_V11: u32 = 2;

/// UDP_MIN_DELAY (milliseconds).
pub const UDP_MIN_DELAY_MS: u64 = 50;

/// UDP_MAX_DELAY (milliseconds).
pub const UDP_MAX_DELAY_MS: u64 = 250;

/// UDP_UPPER_DELAY (milliseconds).
pub const UDP_UPPER_DELAY_MS: u64 = 500;

/// Default size of the duplicate message history.
pub const DEFAULT_DUPLICATE_HISTORY: usize = 1000;

/// Socket receive timeout, only used to check for shutdown.
pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 1_000;

/// Largest datagram accepted by the receivers.
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

// =======================================================================
// Protocol version
// =======================================================================

/// WS-Discovery protocol profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// WS-Discovery April 2005 draft.
    #[default]
    Wsd2005,
    /// OASIS WS-Discovery 1.1 (2009/01).
    Wsd11,
}

impl ProtocolVersion {
    /// Discovery namespace URI.
    pub fn namespace(self) -> &'static str {
        match self {
            Self::Wsd2005 => "http://schemas.xmlsoap.org/ws/2005/04/discovery",
            Self::Wsd11 => "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01",
        }
    }

    /// Value of the `To` header for multicast messages.
    pub fn multicast_to(self) -> &'static str {
        match self {
            Self::Wsd2005 => "urn:schemas-xmlsoap-org:ws:2005:04:discovery",
            Self::Wsd11 => "urn:docs-oasis-open-org:ws-dd:ns:discovery:2009:01",
        }
    }

    /// Default (unicast, multicast) repeat counts.
    pub fn repeat_counts(self) -> (u32, u32) {
        match self {
            Self::Wsd2005 => (UNICAST_UDP_REPEAT, MULTICAST_UDP_REPEAT),
            Self::Wsd11 => (UNICAST_UDP_REPEAT_V11, MULTICAST_UDP_REPEAT_V11),
        }
    }
}

// =======================================================================
// Transport variant
// =======================================================================

/// Transport variant selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Raw payloads.
    #[default]
    Plain,
    /// zlib-compressed payloads.
    Compressed,
}

// =======================================================================
// Retry
// =======================================================================

/// Retransmission schedule (SOAP-over-UDP Appendix I).
///
/// The first transmission happens after a delay drawn uniformly from
/// `[min_delay, max_delay]`; every further repeat doubles the previous
/// delay, capped at `upper_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total transmissions for unicast messages.
    pub unicast_repeats: u32,
    /// Total transmissions for multicast messages.
    pub multicast_repeats: u32,
    /// Lower bound of the initial delay.
    pub min_delay: Duration,
    /// Upper bound of the initial delay.
    pub max_delay: Duration,
    /// Cap applied to every doubled delay.
    pub upper_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::for_version(ProtocolVersion::default())
    }
}

impl RetryConfig {
    /// Standard schedule for a protocol profile.
    pub fn for_version(version: ProtocolVersion) -> Self {
        let (unicast_repeats, multicast_repeats) = version.repeat_counts();
        Self {
            unicast_repeats,
            multicast_repeats,
            min_delay: Duration::from_millis(UDP_MIN_DELAY_MS),
            max_delay: Duration::from_millis(UDP_MAX_DELAY_MS),
            upper_delay: Duration::from_millis(UDP_UPPER_DELAY_MS),
        }
    }

    /// Builder: set repeat counts.
    pub fn with_repeats(mut self, unicast: u32, multicast: u32) -> Self {
        self.unicast_repeats = unicast;
        self.multicast_repeats = multicast;
        self
    }

    /// Builder: set the three delay bounds.
    pub fn with_delays(mut self, min: Duration, max: Duration, upper: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self.upper_delay = upper;
        self
    }

    /// Repeat count for one destination class.
    pub fn repeats(&self, multicast: bool) -> u32 {
        if multicast {
            self.multicast_repeats
        } else {
            self.unicast_repeats
        }
    }

    /// Draw an initial delay uniformly from `[min_delay, max_delay]`.
    pub fn initial_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        if max <= min {
            return self.min_delay;
        }
        Duration::from_millis(fastrand::u64(min..=max))
    }

    fn validate(&self) -> Result<()> {
        if self.unicast_repeats == 0 || self.multicast_repeats == 0 {
            return Err(Error::Config("repeat counts must be > 0".into()));
        }
        if self.min_delay > self.max_delay {
            return Err(Error::Config("min_delay must be <= max_delay".into()));
        }
        if self.upper_delay < self.max_delay {
            return Err(Error::Config("upper_delay must be >= max_delay".into()));
        }
        Ok(())
    }
}

// =======================================================================
// Node configuration
// =======================================================================

/// Configuration for one discovery node.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Multicast group address.
    pub multicast_addr: Ipv4Addr,
    /// Multicast port.
    pub multicast_port: u16,
    /// Interface for multicast join and unicast bind (`None` = any).
    pub interface: Option<Ipv4Addr>,
    /// Fixed unicast port (0 = ephemeral).
    pub unicast_port: u16,
    /// Multicast TTL.
    pub multicast_ttl: u32,
    /// Plain or compressed transport.
    pub transport: TransportKind,
    /// Protocol profile.
    pub version: ProtocolVersion,
    /// Algorithm applied to probes that do not name one.
    pub default_match_by: MatchBy,
    /// Invocation address advertised by the synthesized proxy service.
    pub proxy_xaddr: Option<String>,
    /// Number of message identifiers remembered for duplicate detection.
    pub duplicate_history: usize,
    /// Retransmission schedule.
    pub retry: RetryConfig,
    /// Socket receive timeout (shutdown responsiveness only).
    pub recv_timeout: Duration,
    /// Bounded wait of one dispatch iteration.
    pub dispatch_poll: Duration,
    /// Upper bound on the outbound drain performed by `done()`.
    pub drain_timeout: Duration,
    /// Reject `store()` of an already known endpoint instead of upserting.
    pub strict_store: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast_addr: MULTICAST_GROUP,
            multicast_port: MULTICAST_PORT,
            interface: None,
            unicast_port: 0,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            transport: TransportKind::Plain,
            version: ProtocolVersion::Wsd2005,
            default_match_by: MatchBy::Rfc2396,
            proxy_xaddr: None,
            duplicate_history: DEFAULT_DUPLICATE_HISTORY,
            retry: RetryConfig::default(),
            recv_timeout: Duration::from_millis(DEFAULT_RECV_TIMEOUT_MS),
            dispatch_poll: Duration::from_millis(DEFAULT_RECV_TIMEOUT_MS),
            drain_timeout: Duration::from_secs(5),
            strict_store: false,
        }
    }
}

impl DiscoveryConfig {
    /// Multicast destination as a socket address.
    pub fn multicast_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.multicast_addr), self.multicast_port)
    }

    /// Builder: set multicast group and port.
    pub fn with_multicast(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.multicast_addr = addr;
        self.multicast_port = port;
        self
    }

    /// Builder: select the network interface.
    pub fn with_interface(mut self, iface: Ipv4Addr) -> Self {
        self.interface = Some(iface);
        self
    }

    /// Builder: set a fixed unicast port.
    pub fn with_unicast_port(mut self, port: u16) -> Self {
        self.unicast_port = port;
        self
    }

    /// Builder: override the multicast TTL.
    pub fn with_multicast_ttl(mut self, ttl: u32) -> Self {
        self.multicast_ttl = ttl;
        self
    }

    /// Builder: select the transport variant.
    pub fn with_transport(mut self, kind: TransportKind) -> Self {
        self.transport = kind;
        self
    }

    /// Builder: select the protocol profile.
    ///
    /// Resets the repeat counts to the profile defaults; delays are kept.
    pub fn with_version(mut self, version: ProtocolVersion) -> Self {
        let (unicast, multicast) = version.repeat_counts();
        self.version = version;
        self.retry = self.retry.with_repeats(unicast, multicast);
        self
    }

    /// Builder: default match algorithm.
    pub fn with_default_match_by(mut self, match_by: MatchBy) -> Self {
        self.default_match_by = match_by;
        self
    }

    /// Builder: advertised proxy invocation address.
    pub fn with_proxy_xaddr(mut self, xaddr: impl Into<String>) -> Self {
        self.proxy_xaddr = Some(xaddr.into());
        self
    }

    /// Builder: duplicate history size.
    pub fn with_duplicate_history(mut self, size: usize) -> Self {
        self.duplicate_history = size;
        self
    }

    /// Builder: retransmission schedule.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: socket receive timeout and dispatch poll interval.
    pub fn with_timeouts(mut self, recv_timeout: Duration, dispatch_poll: Duration) -> Self {
        self.recv_timeout = recv_timeout;
        self.dispatch_poll = dispatch_poll;
        self
    }

    /// Builder: reject duplicate stores.
    pub fn with_strict_store(mut self) -> Self {
        self.strict_store = true;
        self
    }

    /// Apply `WSDISCO_*` environment overrides.
    ///
    /// - `WSDISCO_MULTICAST_IF=<ipv4>`: interface
    /// - `WSDISCO_MULTICAST_TTL=<1-255>`: multicast TTL
    /// - `WSDISCO_UNICAST_PORT=<port>`: fixed unicast port
    /// - `WSDISCO_COMPRESS=1`: compressed transport
    ///
    /// Unparseable values are ignored with a debug log.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(var) = std::env::var("WSDISCO_MULTICAST_IF") {
            match var.parse::<Ipv4Addr>() {
                Ok(addr) => {
                    log::debug!("[config] WSDISCO_MULTICAST_IF override: {}", addr);
                    self.interface = Some(addr);
                }
                Err(_) => log::debug!("[config] ignoring invalid WSDISCO_MULTICAST_IF='{}'", var),
            }
        }
        if let Ok(var) = std::env::var("WSDISCO_MULTICAST_TTL") {
            match var.parse::<u32>() {
                Ok(ttl) if (1..=255).contains(&ttl) => self.multicast_ttl = ttl,
                _ => log::debug!("[config] ignoring invalid WSDISCO_MULTICAST_TTL='{}'", var),
            }
        }
        if let Ok(var) = std::env::var("WSDISCO_UNICAST_PORT") {
            match var.parse::<u16>() {
                Ok(port) => self.unicast_port = port,
                Err(_) => log::debug!("[config] ignoring invalid WSDISCO_UNICAST_PORT='{}'", var),
            }
        }
        if let Ok(var) = std::env::var("WSDISCO_COMPRESS") {
            if var == "1" {
                self.transport = TransportKind::Compressed;
            }
        }
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.multicast_addr.is_multicast() {
            return Err(Error::Config(format!(
                "{} is not a multicast address",
                self.multicast_addr
            )));
        }
        if self.multicast_port == 0 {
            return Err(Error::Config("multicast_port must be > 0".into()));
        }
        if self.multicast_ttl == 0 || self.multicast_ttl > 255 {
            return Err(Error::Config("multicast_ttl must be in 1..=255".into()));
        }
        if self.duplicate_history == 0 {
            return Err(Error::Config("duplicate_history must be > 0".into()));
        }
        if self.recv_timeout.is_zero() || self.dispatch_poll.is_zero() {
            return Err(Error::Config("timeouts must be > 0".into()));
        }
        self.retry.validate()
    }
}
