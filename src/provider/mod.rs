// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The responder engine: path-indexed node cache plus method dispatch for
//! `list`/`close`/`subscribe`/`unsubscribe`/`invoke`/`set`.
//!
//! Grounded on `examples/original_source/nodes/provider.go`'s
//! `SimpleProvider`, generalized to async dispatch with per-table locks
//! instead of a single coarse mutex.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::error::DsLinkError;
use crate::node::local::Tree;
use crate::node::{Column, LocalNode, Permission, ResultType};
use crate::wire::message::{method, Request, Response, StreamState, ValueUpdate};

/// The responder's node cache and per-request routing tables.
pub struct Provider {
    root: Arc<LocalNode>,
    list_resp: RwLock<HashMap<i32, Arc<LocalNode>>>,
    subscribers: RwLock<HashMap<i32, Arc<LocalNode>>>,
}

impl Provider {
    /// Build a fresh provider with an empty root node. Returns the provider
    /// alongside the receiving half of its outbound-push channel, which the
    /// link supervisor forwards into the session's outbound path.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Response>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = LocalNode::new_root(tx);
        (
            Self { root, list_resp: RwLock::new(HashMap::new()), subscribers: RwLock::new(HashMap::new()) },
            rx,
        )
    }

    pub fn root(&self) -> &Arc<LocalNode> {
        &self.root
    }

    /// Build an unattached node belonging to this provider's tree. Attach it
    /// with [`LocalNode::add_child`] on its intended parent.
    pub fn new_node(&self, name: impl Into<String>) -> Arc<LocalNode> {
        LocalNode::new(name, Arc::clone(self.tree()))
    }

    fn tree(&self) -> &Arc<Tree> {
        self.root.tree()
    }

    /// Dispatch one inbound request, returning the synchronous response (if
    /// any) to fold into the caller's ACK envelope. `invoke` and `set`'s
    /// async value push travel via the provider's outbound channel instead.
    pub async fn handle_request(&self, req: Request) -> Option<Response> {
        match req.method.as_str() {
            method::LIST => Some(self.handle_list(req).await),
            method::CLOSE => {
                self.handle_close(req).await;
                None
            }
            method::SUBSCRIBE => Some(self.handle_subscribe(req).await),
            method::UNSUBSCRIBE => Some(self.handle_unsubscribe(req).await),
            method::INVOKE => {
                self.handle_invoke(req).await;
                None
            }
            method::SET => self.handle_set(req).await,
            _ => Some(Response::with_error(req.rid, DsLinkError::InvalidMethod.to_msg_err())),
        }
    }

    async fn handle_list(&self, req: Request) -> Response {
        let path = req.path.clone().unwrap_or_default();
        match self.tree().get(&path) {
            Some(node) => {
                self.list_resp.write().await.insert(req.rid, Arc::clone(&node));
                node.list(req.rid).await
            }
            None => Response::with_error(req.rid, DsLinkError::NodeMissing(path).to_msg_err()),
        }
    }

    async fn handle_close(&self, req: Request) {
        let node = self.list_resp.write().await.remove(&req.rid);
        if let Some(node) = node {
            node.close_list(req.rid).await;
        }
    }

    async fn handle_subscribe(&self, req: Request) -> Response {
        let mut newly_subscribed = Vec::new();
        for sub_path in &req.paths {
            match self.tree().get(&sub_path.path) {
                Some(node) => {
                    self.subscribers.write().await.insert(sub_path.sid, Arc::clone(&node));
                    node.subscribe(sub_path.sid).await;
                    newly_subscribed.push((sub_path.sid, node));
                }
                None => {
                    tracing::debug!(path = %sub_path.path, "subscribe: no such node");
                }
            }
        }

        if !newly_subscribed.is_empty() {
            let tree = Arc::clone(self.tree());
            tokio::spawn(async move {
                let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
                let mut updates = Vec::with_capacity(newly_subscribed.len());
                for (sid, node) in newly_subscribed {
                    let value = node.current_value().await;
                    updates.push(
                        serde_json::to_value(ValueUpdate { ts: ts.clone(), sid, value })
                            .unwrap_or(Value::Null),
                    );
                }
                tree.push(Response { rid: 0, stream: None, updates, columns: None, error: None });
            });
        }

        Response::new(req.rid).with_stream(StreamState::Closed)
    }

    async fn handle_unsubscribe(&self, req: Request) -> Response {
        let mut subs = self.subscribers.write().await;
        for sid in &req.sids {
            if let Some(node) = subs.remove(sid) {
                node.unsubscribe(*sid).await;
            }
        }
        Response::new(req.rid).with_stream(StreamState::Closed)
    }

    async fn handle_invoke(&self, req: Request) {
        let path = req.path.clone().unwrap_or_default();
        let rid = req.rid;
        let tree = Arc::clone(self.tree());

        let Some(node) = self.tree().get(&path) else {
            tree.push(Response::with_error(rid, DsLinkError::NodeMissing(path).to_msg_err()));
            return;
        };

        let permit = req.permit.as_deref().map(Permission::parse).unwrap_or(Permission::Config);
        let params = req.params.clone().unwrap_or_default();

        tokio::spawn(async move {
            let Some(required) = node.invoke_permission().await else {
                tree.push(Response::with_error(rid, DsLinkError::InvalidMethod.to_msg_err()));
                return;
            };
            if permit < required {
                tree.push(Response::with_error(rid, DsLinkError::PermissionDenied.to_msg_err()));
                return;
            }

            let columns = node.invoke_def_columns().await;
            let columns_map: Vec<serde_json::Map<String, Value>> =
                columns.iter().map(column_to_map).collect();
            let result_type = node.invoke_result_type().await;
            let handler = node.invoke_handler().await;

            let Some(handler) = handler else {
                tree.push(Response {
                    rid,
                    stream: Some(StreamState::Closed),
                    updates: vec![],
                    columns: Some(columns_map),
                    error: None,
                });
                return;
            };

            let (row_tx, mut row_rx) = mpsc::channel::<Vec<Value>>(16);
            tokio::spawn((handler)(params, row_tx));

            match result_type {
                ResultType::Stream => {
                    let mut first = true;
                    while let Some(row) = row_rx.recv().await {
                        tree.push(Response {
                            rid,
                            stream: Some(StreamState::Open),
                            updates: vec![Value::Array(row)],
                            columns: if first { Some(columns_map.clone()) } else { None },
                            error: None,
                        });
                        first = false;
                    }
                    tree.push(Response {
                        rid,
                        stream: Some(StreamState::Closed),
                        updates: vec![],
                        columns: None,
                        error: None,
                    });
                }
                ResultType::Values | ResultType::Table => {
                    let mut all = Vec::new();
                    while let Some(row) = row_rx.recv().await {
                        all.push(Value::Array(row));
                    }
                    tree.push(Response {
                        rid,
                        stream: Some(StreamState::Closed),
                        updates: all,
                        columns: Some(columns_map),
                        error: None,
                    });
                }
            }
        });
    }

    async fn handle_set(&self, req: Request) -> Option<Response> {
        let path = req.path.clone().unwrap_or_default();
        let Some(node) = self.tree().get(&path) else {
            return Some(Response::with_error(req.rid, DsLinkError::NodeMissing(path).to_msg_err()));
        };

        let Some(required) = node.writable_permission().await else {
            return Some(Response::with_error(req.rid, DsLinkError::InvalidMethod.to_msg_err()));
        };
        let permit = req.permit.as_deref().map(Permission::parse).unwrap_or(Permission::Config);
        if permit < required {
            return Some(Response::with_error(req.rid, DsLinkError::PermissionDenied.to_msg_err()));
        }

        let Some(value) = req.value.clone() else {
            return Some(Response::with_error(
                req.rid,
                DsLinkError::InvalidValue("set requires a value".to_owned()).to_msg_err(),
            ));
        };

        if node.call_set_handler(&value).await {
            node.update_value(value).await;
        }
        None
    }
}

fn column_to_map(column: &Column) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert("name".to_owned(), Value::String(column.name.clone()));
    map.insert("type".to_owned(), Value::String(column.column_type.as_wire_string()));
    map
}
