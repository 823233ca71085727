// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON and MessagePack encoding, dispatched by the format negotiated during
//! the handshake.

use tokio_tungstenite::tungstenite::Message as WsFrame;

use crate::error::{DsLinkError, Result};
use crate::wire::message::Message;

/// Wire format negotiated with the broker during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Msgpack,
}

impl Format {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "msgpack" => Ok(Self::Msgpack),
            other => Err(DsLinkError::UnsupportedFormat(other.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Msgpack => "msgpack",
        }
    }

    /// Encode a `Message` into the WebSocket frame type this format uses:
    /// text for JSON, binary for MessagePack.
    pub fn encode(&self, msg: &Message) -> Result<WsFrame> {
        match self {
            Self::Json => {
                let text = serde_json::to_string(msg)?;
                Ok(WsFrame::Text(text.into()))
            }
            Self::Msgpack => {
                let bytes = rmp_serde::to_vec_named(msg)?;
                Ok(WsFrame::Binary(bytes.into()))
            }
        }
    }

    /// Decode an inbound frame into a `Message`. The requester side is
    /// lenient of unknown fields (handled by `serde`'s default behavior of
    /// ignoring them).
    pub fn decode(&self, frame: &WsFrame) -> Result<Message> {
        match (self, frame) {
            (Self::Json, WsFrame::Text(text)) => {
                serde_json::from_str(text).map_err(DsLinkError::from)
            }
            (Self::Msgpack, WsFrame::Binary(bytes)) => {
                rmp_serde::from_slice(bytes).map_err(DsLinkError::from)
            }
            _ => Err(DsLinkError::FrameDecodeFailed(format!(
                "frame type does not match negotiated format {:?}",
                self
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message::{method, Request};

    fn sample_message() -> Message {
        Message {
            msg: 3,
            ack: Some(2),
            requests: vec![Request::new(1, method::LIST)],
            responses: vec![],
            salt: None,
        }
    }

    #[test]
    fn json_round_trip() {
        let msg = sample_message();
        let frame = Format::Json.encode(&msg).unwrap();
        assert!(matches!(frame, WsFrame::Text(_)));
        let back = Format::Json.decode(&frame).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn msgpack_round_trip() {
        let msg = sample_message();
        let frame = Format::Msgpack.encode(&msg).unwrap();
        assert!(matches!(frame, WsFrame::Binary(_)));
        let back = Format::Msgpack.decode(&frame).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn cross_format_semantic_identity() {
        let msg = sample_message();
        let json_frame = Format::Json.encode(&msg).unwrap();
        let via_json = Format::Json.decode(&json_frame).unwrap();
        let msgpack_frame = Format::Msgpack.encode(&via_json).unwrap();
        let via_msgpack = Format::Msgpack.decode(&msgpack_frame).unwrap();
        assert_eq!(msg, via_msgpack);
    }

    #[test]
    fn unsupported_format_rejected() {
        assert!(Format::parse("cbor").is_err());
    }

    proptest::proptest! {
        #[test]
        fn json_round_trip_is_lossless(
            msg in proptest::option::of(1i32..1000),
            ack in proptest::option::of(1i32..1000),
            rid in 1i32..1000,
            method in "[a-z]{1,8}",
            salt in proptest::option::of("[a-zA-Z0-9]{0,16}"),
        ) {
            let original = Message {
                msg: msg.unwrap_or(0),
                ack,
                requests: vec![Request::new(rid, method.clone())],
                responses: vec![],
                salt,
            };
            let frame = Format::Json.encode(&original).unwrap();
            let decoded = Format::Json.decode(&frame).unwrap();
            proptest::prop_assert_eq!(original, decoded);
        }

        #[test]
        fn format_identity_survives_a_json_msgpack_round_trip(
            msg in 1i32..1000,
            ack in proptest::option::of(1i32..1000),
            rid in 1i32..1000,
            method in "[a-z]{1,8}",
        ) {
            let original = Message {
                msg,
                ack,
                requests: vec![Request::new(rid, method.clone())],
                responses: vec![],
                salt: None,
            };
            let via_json = Format::Json.decode(&Format::Json.encode(&original).unwrap()).unwrap();
            let via_msgpack =
                Format::Msgpack.decode(&Format::Msgpack.encode(&via_json).unwrap()).unwrap();
            proptest::prop_assert_eq!(original, via_msgpack);
        }
    }
}
