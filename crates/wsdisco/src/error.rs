// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Errors fall in three groups:
//! - **Fatal at startup**: [`Error::TransportInit`], [`Error::Config`]
//! - **Per-message, recoverable**: [`Error::Parse`], [`Error::MissingMessageId`]
//! - **Caller errors**: [`Error::UnsupportedMatcher`], [`Error::Registry`],
//!   [`Error::DuplicateEndpoint`], [`Error::InvalidState`]
//!
//! "Not found" is never an error: `update`/`remove` report it as `Ok(false)`.

use crate::matcher::MatchBy;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Discovery error.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket creation, bind or multicast join failed.
    #[error("transport init failed: {context}: {source}")]
    TransportInit {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error after the transport came up.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound bytes could not be decoded into a protocol message.
    #[error("parse error: {0}")]
    Parse(String),

    /// Outbound message could not be encoded.
    #[error("serialize error: {0}")]
    Serialize(String),

    /// Message carries no identifier, cannot be deduplicated.
    #[error("message has no identifier")]
    MissingMessageId,

    /// Scope matching algorithm is not implemented.
    #[error("unsupported scope matcher: {0}")]
    UnsupportedMatcher(MatchBy),

    /// Strict store refused a second entry for the same endpoint.
    #[error("duplicate endpoint: {0}")]
    DuplicateEndpoint(String),

    /// Storage backend rejected the operation.
    #[error("registry error: {0}")]
    Registry(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Operation not allowed in the current engine state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Wrap an I/O error raised while bringing a transport up.
    pub(crate) fn transport_init(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::TransportInit {
            context: context.into(),
            source,
        }
    }

    /// True for errors that only affect a single inbound message.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::MissingMessageId)
    }
}
