// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The requester-side mirror of a remote node's externally-visible state.
//!
//! Grounded on `examples/original_source/nodes/remote.go`'s `RemoteNode`:
//! per-field locking, no subscribers, no invoke handler.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

/// A read-only mirror of a node in a remote tree, built from `list`
/// responses. No subscriber bookkeeping: value pushes for remote nodes are
/// the caller's concern via [`crate::requester::Requester::subscribe`]-style
/// plumbing at a higher layer, not modeled on this struct.
#[derive(Debug, Default)]
pub struct RemoteNode {
    name: String,
    path: String,
    attributes: RwLock<HashMap<String, Value>>,
    configs: RwLock<HashMap<String, Value>>,
    children: RwLock<HashMap<String, Value>>,
}

impl RemoteNode {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            attributes: RwLock::new(HashMap::new()),
            configs: RwLock::new(HashMap::new()),
            children: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn set_attribute(&self, key: impl Into<String>, value: Value) {
        self.attributes.write().await.insert(key.into(), value);
    }

    pub async fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes.read().await.get(key).cloned()
    }

    pub async fn set_config(&self, key: impl Into<String>, value: Value) {
        self.configs.write().await.insert(key.into(), value);
    }

    pub async fn config(&self, key: &str) -> Option<Value> {
        self.configs.read().await.get(key).cloned()
    }

    pub async fn set_child(&self, name: impl Into<String>, value: Value) {
        self.children.write().await.insert(name.into(), value);
    }

    pub async fn child(&self, name: &str) -> Option<Value> {
        self.children.read().await.get(name).cloned()
    }

    pub async fn configs_snapshot(&self) -> HashMap<String, Value> {
        self.configs.read().await.clone()
    }

    pub async fn attributes_snapshot(&self) -> HashMap<String, Value> {
        self.attributes.read().await.clone()
    }

    /// `$is`, defaulting to `"node"` if unset.
    pub async fn profile(&self) -> String {
        self.config("$is")
            .await
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "node".to_owned())
    }

    /// `$disconnectedTs`, present when the remote node reports itself
    /// unavailable.
    pub async fn disconnected_ts(&self) -> Option<Value> {
        self.config("$disconnectedTs").await
    }
}
