// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serializer seam between protocol messages and datagram payloads.

use super::ProtocolMessage;
use crate::error::{Error, Result};

/// Converts protocol messages to wire bytes and back.
///
/// `deserialize` must fail with [`Error::Parse`] on malformed input; the
/// dispatch loop drops such datagrams and keeps running.
pub trait MessageCodec: Send + Sync {
    fn serialize(&self, message: &ProtocolMessage) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<ProtocolMessage>;
}

/// JSON envelope codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn serialize(&self, message: &ProtocolMessage) -> Result<Vec<u8>> {
        serde_json::to_vec(message).map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<ProtocolMessage> {
        serde_json::from_slice(bytes).map_err(|e| Error::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchBy;
    use crate::protocol::{AppSequence, Body};
    use crate::service::{ProbeRequest, QName, ServiceDescription};

    #[test]
    fn test_probe_survives_codec() {
        let codec = JsonCodec;
        let probe = ProbeRequest::any()
            .with_type(QName::new("urn:test", "Calc"))
            .with_scope("http://s/a")
            .with_match_by(MatchBy::Strcmp0);
        let msg = ProtocolMessage::new(Body::Probe(probe)).with_app_sequence(AppSequence {
            instance_id: 42,
            sequence_id: None,
            message_number: 3,
        });

        let bytes = codec.serialize(&msg).expect("serialize");
        let decoded = codec.deserialize(&bytes).expect("deserialize");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_matches_body_survives_codec() {
        let codec = JsonCodec;
        let svc = ServiceDescription::new("urn:uuid:1")
            .with_scope("http://s")
            .with_xaddr("http://10.0.0.1:8080/calc");
        let msg = ProtocolMessage::new(Body::ProbeMatches(vec![svc]))
            .with_relates_to(Some("urn:uuid:req".into()));

        let decoded = codec
            .deserialize(&codec.serialize(&msg).expect("serialize"))
            .expect("deserialize");
        assert_eq!(decoded.relates_to.as_deref(), Some("urn:uuid:req"));
        assert_eq!(decoded.body, msg.body);
    }

    #[test]
    fn test_malformed_input_is_parse_error() {
        let codec = JsonCodec;
        let inputs: [&[u8]; 4] = [
            b"",
            b"not json",
            b"{\"body\":{\"action\":\"Nope\"}}",
            &[0xff, 0x00, 0x13],
        ];
        for bad in inputs {
            let err = codec.deserialize(bad).expect_err("must fail");
            assert!(matches!(err, Error::Parse(_)), "{:?}", err);
            assert!(err.is_recoverable());
        }
    }
}
