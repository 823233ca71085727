// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the dslink client.

use crate::wire::message::MsgErr;

/// Phase at which a handshake failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Resolving/parsing the broker URL.
    Url,
    /// The `POST /conn` exchange.
    Conn,
    /// Deriving the shared secret / auth token.
    Crypto,
    /// Dialing the negotiated WebSocket URI.
    Dial,
}

impl std::fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Url => "url",
            Self::Conn => "conn",
            Self::Crypto => "crypto",
            Self::Dial => "dial",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the dslink client.
#[derive(Debug, thiserror::Error)]
pub enum DsLinkError {
    #[error("handshake failed during {phase}: {cause}")]
    HandshakeFailed { phase: HandshakePhase, cause: String },

    #[error("broker negotiated unsupported format {0:?}")]
    UnsupportedFormat(String),

    #[error("bad server key: {0}")]
    BadServerKey(String),

    #[error("socket closed")]
    SocketClosed,

    #[error("failed to decode frame: {0}")]
    FrameDecodeFailed(String),

    #[error("node not found: {0}")]
    NodeMissing(String),

    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid method")]
    InvalidMethod,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    #[error("key error: {0}")]
    Key(String),
}

pub type Result<T> = std::result::Result<T, DsLinkError>;

impl DsLinkError {
    /// The standard `MsgErr.type` string for this error, per the wire schema.
    pub fn msg_err_type(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permissionDenied",
            Self::InvalidMethod => "invalidMethod",
            Self::NodeMissing(_) => "invalidPath",
            Self::NodeUnavailable(_) => "disconnected",
            Self::InvalidValue(_) => "invalidValue",
            Self::InvalidParameter(_) => "invalidParameter",
            _ => "failed",
        }
    }

    /// Convert a per-request error into the wire `MsgErr` carried on a `Response`.
    pub fn to_msg_err(&self) -> MsgErr {
        MsgErr {
            r#type: self.msg_err_type().to_owned(),
            msg: self.to_string(),
            phase: None,
            path: None,
            detail: None,
        }
    }
}
