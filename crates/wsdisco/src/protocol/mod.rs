// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol message model.
//!
//! [`ProtocolMessage`] is the in-memory form of a discovery envelope: the
//! addressing headers (message id, relates-to, reply-to, to), an optional
//! application sequence and an action-specific [`Body`]. Turning it into
//! wire bytes is the job of a [`MessageCodec`].

pub mod codec;

pub use codec::{JsonCodec, MessageCodec};

use crate::service::{ProbeRequest, ServiceDescription};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discovery action carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Hello,
    Bye,
    Probe,
    ProbeMatches,
    Resolve,
    ResolveMatches,
    Suppression,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hello => "Hello",
            Self::Bye => "Bye",
            Self::Probe => "Probe",
            Self::ProbeMatches => "ProbeMatches",
            Self::Resolve => "Resolve",
            Self::ResolveMatches => "ResolveMatches",
            Self::Suppression => "Suppression",
        };
        f.write_str(name)
    }
}

/// Application sequencing header.
///
/// `instance_id` is fixed for one node run; `message_number` increases
/// with every announcement or match response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSequence {
    pub instance_id: u64,
    pub sequence_id: Option<String>,
    pub message_number: u64,
}

/// Action-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "body")]
pub enum Body {
    Hello(ServiceDescription),
    Bye(ServiceDescription),
    Probe(ProbeRequest),
    ProbeMatches(Vec<ServiceDescription>),
    /// Endpoint reference to resolve.
    Resolve(String),
    ResolveMatches(ServiceDescription),
    /// Proxy announcement asking the receiver to switch to unicast.
    Suppression(ServiceDescription),
}

impl Body {
    pub fn action(&self) -> Action {
        match self {
            Self::Hello(_) => Action::Hello,
            Self::Bye(_) => Action::Bye,
            Self::Probe(_) => Action::Probe,
            Self::ProbeMatches(_) => Action::ProbeMatches,
            Self::Resolve(_) => Action::Resolve,
            Self::ResolveMatches(_) => Action::ResolveMatches,
            Self::Suppression(_) => Action::Suppression,
        }
    }
}

/// One discovery message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    /// Unique message identifier (`urn:uuid:...`).
    pub message_id: Option<String>,
    /// Identifier of the request this message answers.
    pub relates_to: Option<String>,
    /// Endpoint reference of the sender, if it wants replies elsewhere.
    pub reply_to: Option<String>,
    /// Logical destination (the discovery URN for multicast).
    pub to: Option<String>,
    pub app_sequence: Option<AppSequence>,
    pub body: Body,
}

impl ProtocolMessage {
    /// New message with a fresh identifier.
    pub fn new(body: Body) -> Self {
        Self {
            message_id: Some(new_message_id()),
            relates_to: None,
            reply_to: None,
            to: None,
            app_sequence: None,
            body,
        }
    }

    pub fn action(&self) -> Action {
        self.body.action()
    }

    /// Replace the identifier with a fresh one.
    pub fn renew_id(&mut self) -> &str {
        self.message_id.insert(new_message_id())
    }

    pub fn with_relates_to(mut self, id: Option<String>) -> Self {
        self.relates_to = id;
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_app_sequence(mut self, seq: AppSequence) -> Self {
        self.app_sequence = Some(seq);
        self
    }
}

/// Fresh `urn:uuid:` message identifier.
pub fn new_message_id() -> String {
    format!("urn:uuid:{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_has_unique_id() {
        let a = ProtocolMessage::new(Body::Resolve("urn:uuid:x".into()));
        let b = ProtocolMessage::new(Body::Resolve("urn:uuid:x".into()));
        assert!(a.message_id.is_some());
        assert_ne!(a.message_id, b.message_id);
        assert_eq!(a.action(), Action::Resolve);
    }

    #[test]
    fn test_renew_id() {
        let mut msg = ProtocolMessage::new(Body::Probe(ProbeRequest::any()));
        let before = msg.message_id.clone();
        let after = msg.renew_id().to_string();
        assert_ne!(before.as_deref(), Some(after.as_str()));
        assert!(after.starts_with("urn:uuid:"));
    }

    #[test]
    fn test_body_action_mapping() {
        let svc = ServiceDescription::new("urn:uuid:s");
        assert_eq!(Body::Hello(svc.clone()).action(), Action::Hello);
        assert_eq!(Body::Bye(svc.clone()).action(), Action::Bye);
        assert_eq!(Body::ProbeMatches(vec![]).action(), Action::ProbeMatches);
        assert_eq!(Body::ResolveMatches(svc.clone()).action(), Action::ResolveMatches);
        assert_eq!(Body::Suppression(svc).action(), Action::Suppression);
        assert_eq!(Action::ProbeMatches.to_string(), "ProbeMatches");
    }
}
