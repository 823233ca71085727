// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codec-neutral wire types for the broker protocol.
//!
//! Field names and `omitempty` shapes mirror
//! `examples/original_source/messages.go` exactly; these are shared by both
//! the JSON and MessagePack codecs (`crate::wire::codec`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One frame of the session protocol: a batch of requests and/or responses
/// stamped with a monotonic `msg` number.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub msg: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<Request>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Message {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.responses.is_empty() && self.salt.is_none()
    }
}

/// An outgoing (requester) or incoming (responder) RPC.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub rid: i32,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<SubPath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sids: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Request {
    pub fn new(rid: i32, method: impl Into<String>) -> Self {
        Self { rid, method: method.into(), ..Default::default() }
    }
}

/// A `subscribe` request's per-path entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubPath {
    pub path: String,
    pub sid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos: Option<i32>,
}

/// Stream lifecycle state carried on a `Response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Initialize,
    Open,
    Closed,
}

/// A reply to a `Request`, or (when `rid == 0`) an out-of-band value push.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub rid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updates: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<serde_json::Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MsgErr>,
}

impl Response {
    pub fn new(rid: i32) -> Self {
        Self { rid, ..Default::default() }
    }

    pub fn with_stream(mut self, stream: StreamState) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_error(rid: i32, error: MsgErr) -> Self {
        Self { rid, error: Some(error), ..Default::default() }
    }
}

/// A value push update: `{ts, sid, value}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueUpdate {
    pub ts: String,
    pub sid: i32,
    pub value: Value,
}

/// Protocol-level error payload, carried on a `Response`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MsgErr {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Standard `MsgErr.type` values, per the wire schema (spec.md §6).
pub mod err_type {
    pub const PERMISSION_DENIED: &str = "permissionDenied";
    pub const INVALID_METHOD: &str = "invalidMethod";
    pub const NOT_IMPLEMENTED: &str = "notImplemented";
    pub const INVALID_PATH: &str = "invalidPath";
    pub const INVALID_PATHS: &str = "invalidPaths";
    pub const INVALID_VALUE: &str = "invalidValue";
    pub const INVALID_PARAMETER: &str = "invalidParameter";
    pub const DISCONNECTED: &str = "disconnected";
    pub const FAILED: &str = "failed";
}

/// RPC method names used in `Request.method`.
pub mod method {
    pub const LIST: &str = "list";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const CLOSE: &str = "close";
    pub const SET: &str = "set";
    pub const REMOVE: &str = "remove";
    pub const INVOKE: &str = "invoke";
}
