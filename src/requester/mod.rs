// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The requester engine: outgoing rid allocation, response routing, and the
//! higher-level `list`/`getRemoteNode` calls.
//!
//! Grounded on `examples/original_source/nodes/requester.go`'s rid wraparound
//! and on spec-level `$is` profile resolution (`/def/profile/<name>`).

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::error::{DsLinkError, Result};
use crate::node::RemoteNode;
use crate::wire::message::{method, Request, Response, StreamState};

/// Outgoing request-id allocator and response routing table.
pub struct Requester {
    next_rid: Mutex<i32>,
    pending: RwLock<HashMap<i32, mpsc::UnboundedSender<Response>>>,
    outbound_tx: mpsc::UnboundedSender<Request>,
}

impl Requester {
    /// Build a fresh requester. Returns it alongside the receiving half of
    /// its outbound-request channel, which the link supervisor forwards
    /// into the session's outbound path.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Request>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { next_rid: Mutex::new(0), pending: RwLock::new(HashMap::new()), outbound_tx: tx }, rx)
    }

    /// Allocate the next rid, wrapping `0x7FFFFFFF` back to `0` and always
    /// pre-incrementing so `0` is never handed out.
    fn next_rid(&self) -> i32 {
        let mut guard = self.next_rid.lock().unwrap_or_else(|e| e.into_inner());
        if *guard >= 0x7FFFFFFF {
            *guard = 0;
        }
        *guard += 1;
        *guard
    }

    /// Register `sink` for the rid this request is assigned, then hand it to
    /// the supervisor's outbound path. Returns the assigned rid.
    pub async fn send_request(&self, mut req: Request, sink: mpsc::UnboundedSender<Response>) -> i32 {
        let rid = self.next_rid();
        req.rid = rid;
        self.pending.write().await.insert(rid, sink);
        let _ = self.outbound_tx.send(req);
        rid
    }

    /// Route an inbound response to its originating request's sink,
    /// dropping the entry once the stream closes.
    pub async fn handle_response(&self, resp: Response) {
        let rid = resp.rid;
        let closed = resp.stream == Some(StreamState::Closed);
        let sink = if closed {
            self.pending.write().await.remove(&rid)
        } else {
            self.pending.read().await.get(&rid).cloned()
        };
        if let Some(sink) = sink {
            let _ = sink.send(resp);
        }
    }

    /// Cancel a pending request: enqueue `{method: close, rid}` and drop the
    /// routing entry.
    pub async fn close_request(&self, rid: i32) {
        self.pending.write().await.remove(&rid);
        let _ = self.outbound_tx.send(Request::new(rid, method::CLOSE));
    }

    /// Issue `list` against `path`, forwarding each response's primitive
    /// updates into `sink` as they arrive. Returns the rid so the caller can
    /// `close_request` when done.
    pub async fn list(&self, path: &str, sink: mpsc::UnboundedSender<Value>) -> i32 {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel::<Response>();
        let req = Request { path: Some(path.to_owned()), ..Request::new(0, method::LIST) };
        let rid = self.send_request(req, resp_tx).await;

        tokio::spawn(async move {
            while let Some(resp) = resp_rx.recv().await {
                let is_closed = resp.stream == Some(StreamState::Closed);
                for update in resp.updates {
                    let _ = sink.send(update);
                }
                if is_closed {
                    break;
                }
            }
        });

        rid
    }

    /// Issue `list`, block on the first response, close the request, and
    /// assemble a [`RemoteNode`]. Resolves `$is` profiles one level deep.
    pub async fn get_remote_node(&self, path: &str) -> Result<RemoteNode> {
        let node = self.fetch_node_raw(path).await?;

        if let Some(ts) = node.disconnected_ts().await {
            return Err(DsLinkError::NodeUnavailable(format!("{path} disconnected at {ts}")));
        }

        let is_value = node.profile().await;
        if is_value != "node" {
            let profile_path = format!("/def/profile/{is_value}");
            if let Ok(profile) = Box::pin(self.fetch_node_raw(&profile_path)).await {
                for (key, value) in profile.configs_snapshot().await {
                    if node.config(&key).await.is_none() {
                        node.set_config(key, value).await;
                    }
                }
                for (key, value) in profile.attributes_snapshot().await {
                    if node.attribute(&key).await.is_none() {
                        node.set_attribute(key, value).await;
                    }
                }
            }
        }

        Ok(node)
    }

    async fn fetch_node_raw(&self, path: &str) -> Result<RemoteNode> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel::<Response>();
        let req = Request { path: Some(path.to_owned()), ..Request::new(0, method::LIST) };
        let rid = self.send_request(req, resp_tx).await;
        let resp = resp_rx.recv().await.ok_or(DsLinkError::SocketClosed)?;
        self.close_request(rid).await;

        let name = path.rsplit('/').next().unwrap_or_default();
        let node = RemoteNode::new(crate::wire::name::decode_name(name), path.to_owned());

        for update in &resp.updates {
            let Some(pair) = update.as_array() else { continue };
            if pair.len() != 2 {
                continue;
            }
            let Some(key) = pair[0].as_str() else { continue };
            let value = pair[1].clone();

            if let Some(stripped) = key.strip_prefix('$') {
                node.set_config(format!("${stripped}"), value).await;
            } else if let Some(stripped) = key.strip_prefix('@') {
                node.set_attribute(format!("@{stripped}"), value).await;
            } else {
                node.set_child(key, value).await;
            }
        }

        Ok(node)
    }
}
