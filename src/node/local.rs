// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The responder-side node tree.
//!
//! Grounded on `examples/original_source/nodes/node.go`'s `SimpleNode` and
//! `nodes/provider.go`'s cache, generalized per-field locking per the
//! teacher's convention of one `RwLock` per independently-mutated piece of
//! state (see `upstream/bridge.rs`'s `Arc<RwLock<HashMap<ClientId, ..>>>`
//! clients table).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use chrono::SecondsFormat;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::wire::message::{Response, StreamState, ValueUpdate};

/// The value type advertised via a node's `$type` config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Num,
    String,
    Dynamic,
    Map,
    Array,
    Enum(Vec<String>),
}

impl ValueType {
    pub fn as_wire_string(&self) -> String {
        match self {
            Self::Bool => "bool".to_owned(),
            Self::Num => "num".to_owned(),
            Self::String => "string".to_owned(),
            Self::Dynamic => "dynamic".to_owned(),
            Self::Map => "map".to_owned(),
            Self::Array => "array".to_owned(),
            Self::Enum(options) => format!("enum[{}]", options.join(",")),
        }
    }
}

/// A column in an action's result table.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub column_type: ValueType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ValueType) -> Self {
        Self { name: name.into(), column_type }
    }

    fn to_map(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert("name".to_owned(), Value::String(self.name.clone()));
        map.insert("type".to_owned(), Value::String(self.column_type.as_wire_string()));
        map
    }
}

/// Row sender handed to an invoke handler; a bounded channel gives
/// backpressure instead of the busy-wait an unbounded queue would invite.
pub type RowSender = mpsc::Sender<Vec<Value>>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How an action's results should be delivered: one shot or as a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Values,
    Table,
    Stream,
}

/// An invokable action's metadata and handler.
pub struct InvokeDef {
    pub columns: Vec<Column>,
    pub result: ResultType,
    /// Permission level required to invoke, default `write` when an action exists.
    pub invokable: Permission,
    pub handler: Arc<dyn Fn(serde_json::Map<String, Value>, RowSender) -> BoxFuture<'static, ()> + Send + Sync>,
}

/// A handler for inbound `set` requests: `(node, value) -> accepted`.
pub type SetHandlerFn = Arc<dyn Fn(&LocalNode, &Value) -> bool + Send + Sync>;

/// Broker permission levels, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permission {
    List,
    Read,
    Write,
    Config,
    Never,
}

impl Permission {
    pub fn parse(s: &str) -> Self {
        match s {
            "list" => Self::List,
            "read" => Self::Read,
            "write" => Self::Write,
            "config" => Self::Config,
            "never" => Self::Never,
            _ => Self::Config,
        }
    }

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Read => "read",
            Self::Write => "write",
            Self::Config => "config",
            Self::Never => "never",
        }
    }
}

struct ValueSlot {
    value: Value,
    value_type: Option<ValueType>,
}

/// Shared tree-wide state: the path cache and the outbound push channel.
///
/// Every reachable node holds a strong `Arc<Tree>`; the cache holds only
/// [`Weak`] references back to nodes, so a node's reachability from the
/// cache and from the parent-child chain coincide (see the provider-cache
/// invariant in the node tree's data model).
pub(crate) struct Tree {
    cache: std::sync::Mutex<HashMap<String, Weak<LocalNode>>>,
    outbound: mpsc::UnboundedSender<Response>,
}

impl Tree {
    pub(crate) fn new(outbound: mpsc::UnboundedSender<Response>) -> Arc<Self> {
        Arc::new(Self { cache: std::sync::Mutex::new(HashMap::new()), outbound })
    }

    pub(crate) fn insert(&self, path: String, node: &Arc<LocalNode>) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).insert(path, Arc::downgrade(node));
    }

    pub(crate) fn remove(&self, path: &str) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).remove(path);
    }

    pub(crate) fn get(&self, path: &str) -> Option<Arc<LocalNode>> {
        let guard = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(path).and_then(Weak::upgrade)
    }

    pub(crate) fn push(&self, response: Response) {
        let _ = self.outbound.send(response);
    }
}

/// One node in the responder's tree.
pub struct LocalNode {
    name: String,
    path: RwLock<String>,
    parent: RwLock<Weak<LocalNode>>,
    tree: Arc<Tree>,
    children: RwLock<IndexMap<String, Arc<LocalNode>>>,
    attributes: RwLock<IndexMap<String, Value>>,
    configs: RwLock<IndexMap<String, Value>>,
    value: RwLock<ValueSlot>,
    list_subs: RwLock<Vec<i32>>,
    value_subs: RwLock<Vec<i32>>,
    invoke: RwLock<Option<InvokeDef>>,
    set_handler: RwLock<Option<SetHandlerFn>>,
}

impl LocalNode {
    /// Build the root node (`path == ""`) owning a fresh tree. Used once by
    /// `Provider::new`.
    pub(crate) fn new_root(outbound: mpsc::UnboundedSender<Response>) -> Arc<Self> {
        let tree = Tree::new(outbound);
        let root = Arc::new(Self {
            name: String::new(),
            path: RwLock::new(String::new()),
            parent: RwLock::new(Weak::new()),
            tree: Arc::clone(&tree),
            children: RwLock::new(IndexMap::new()),
            attributes: RwLock::new(IndexMap::new()),
            configs: RwLock::new(default_configs()),
            value: RwLock::new(ValueSlot { value: Value::Null, value_type: None }),
            list_subs: RwLock::new(Vec::new()),
            value_subs: RwLock::new(Vec::new()),
            invoke: RwLock::new(None),
            set_handler: RwLock::new(None),
        });
        tree.insert(String::new(), &root);
        root
    }

    /// Build an unattached child node. Call [`LocalNode::add_child`] on its
    /// intended parent to join it to the tree.
    pub fn new(name: impl Into<String>, tree: Arc<Tree>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            path: RwLock::new(String::new()),
            parent: RwLock::new(Weak::new()),
            tree,
            children: RwLock::new(IndexMap::new()),
            attributes: RwLock::new(IndexMap::new()),
            configs: RwLock::new(default_configs()),
            value: RwLock::new(ValueSlot { value: Value::Null, value_type: None }),
            list_subs: RwLock::new(Vec::new()),
            value_subs: RwLock::new(Vec::new()),
            invoke: RwLock::new(None),
            set_handler: RwLock::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn path(&self) -> String {
        self.path.read().await.clone()
    }

    pub(crate) fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    pub async fn set_config(&self, key: impl Into<String>, value: Value) {
        self.configs.write().await.insert(key.into(), value);
    }

    pub async fn config(&self, key: &str) -> Option<Value> {
        self.configs.read().await.get(key).cloned()
    }

    pub async fn set_attribute(&self, key: impl Into<String>, value: Value) {
        self.attributes.write().await.insert(key.into(), value);
    }

    pub async fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes.read().await.get(key).cloned()
    }

    pub async fn set_type(&self, value_type: ValueType) {
        let wire = value_type.as_wire_string();
        self.configs.write().await.insert("$type".to_owned(), Value::String(wire));
        self.value.write().await.value_type = Some(value_type);
    }

    pub async fn set_writable(&self, permission: Permission) {
        self.configs
            .write()
            .await
            .insert("$writable".to_owned(), Value::String(permission.as_wire_str().to_owned()));
    }

    pub async fn set_invoke(&self, def: InvokeDef) {
        self.configs.write().await.insert(
            "$invokable".to_owned(),
            Value::String(def.invokable.as_wire_str().to_owned()),
        );
        self.configs.write().await.insert(
            "$result".to_owned(),
            Value::String(
                match def.result {
                    ResultType::Values => "values",
                    ResultType::Table => "table",
                    ResultType::Stream => "stream",
                }
                .to_owned(),
            ),
        );
        *self.invoke.write().await = Some(def);
    }

    pub async fn set_set_handler(&self, handler: SetHandlerFn) {
        *self.set_handler.write().await = Some(handler);
    }

    pub(crate) async fn invoke_def_columns(&self) -> Vec<Column> {
        self.invoke.read().await.as_ref().map(|d| d.columns.clone()).unwrap_or_default()
    }

    pub(crate) async fn invoke_result_type(&self) -> ResultType {
        self.invoke.read().await.as_ref().map(|d| d.result).unwrap_or(ResultType::Values)
    }

    pub(crate) async fn invoke_permission(&self) -> Option<Permission> {
        self.invoke.read().await.as_ref().map(|d| d.invokable)
    }

    pub(crate) async fn invoke_handler(
        &self,
    ) -> Option<Arc<dyn Fn(serde_json::Map<String, Value>, RowSender) -> BoxFuture<'static, ()> + Send + Sync>>
    {
        self.invoke.read().await.as_ref().map(|d| Arc::clone(&d.handler))
    }

    pub(crate) async fn writable_permission(&self) -> Option<Permission> {
        let configs = self.configs.read().await;
        configs.get("$writable").and_then(|v| v.as_str()).map(Permission::parse)
    }

    pub(crate) async fn call_set_handler(&self, value: &Value) -> bool {
        let handler = self.set_handler.read().await.clone();
        match handler {
            Some(f) => f(self, value),
            None => false,
        }
    }

    /// Attach `child` under `self`, assigning its path and registering it in
    /// the shared cache, then notify list-subscribers of the addition.
    pub async fn add_child(self: &Arc<Self>, child: Arc<LocalNode>) {
        let parent_path = self.path.read().await.clone();
        let child_path = join_path(&parent_path, &crate::wire::name::encode_name(&child.name));

        *child.path.write().await = child_path.clone();
        *child.parent.write().await = Arc::downgrade(self);
        self.tree.insert(child_path, &child);

        self.children.write().await.insert(child.name.clone(), Arc::clone(&child));

        let update = serde_json::json!([child.name.clone(), child.to_map().await]);
        self.notify_list_subscribers(update).await;
    }

    /// Detach and recursively remove the child named `name`.
    pub async fn remove_child(&self, name: &str) {
        let child = self.children.write().await.shift_remove(name);
        if let Some(child) = child {
            child.remove_recursive().await;
            let update = serde_json::json!({"name": name, "change": "remove"});
            self.notify_list_subscribers(update).await;
        }
    }

    /// Remove this node and all descendants (post-order), deregistering each
    /// from the cache. Does not touch the parent's children map; callers
    /// that want parent-side bookkeeping should go through
    /// [`LocalNode::remove_child`] instead.
    async fn remove_recursive(&self) {
        let children: Vec<Arc<LocalNode>> =
            self.children.write().await.drain(..).map(|(_, v)| v).collect();
        for child in children {
            Box::pin(child.remove_recursive()).await;
        }
        let path = self.path.read().await.clone();
        self.tree.remove(&path);
        *self.parent.write().await = Weak::new();
    }

    /// Externally-visible subset used in parent listings.
    pub async fn to_map(&self) -> serde_json::Map<String, Value> {
        let configs = self.configs.read().await;
        let mut map = serde_json::Map::new();
        map.insert(
            "$is".to_owned(),
            configs.get("$is").cloned().unwrap_or_else(|| Value::String("node".to_owned())),
        );
        if let Some(name) = configs.get("$name") {
            map.insert("$name".to_owned(), name.clone());
        }
        if let Some(permission) = configs.get("$permission") {
            if permission.as_str() != Some("read") {
                map.insert("$permission".to_owned(), permission.clone());
            }
        }
        if let Some(ty) = configs.get("$type") {
            map.insert("$type".to_owned(), ty.clone());
        }
        if let Some(iface) = configs.get("$interface") {
            map.insert("$interface".to_owned(), iface.clone());
        }
        if let Some(invokable) = configs.get("$invokable") {
            map.insert("$invokable".to_owned(), invokable.clone());
        }
        map
    }

    /// Register `rid` as a list-subscriber and synthesize the initial
    /// listing response.
    pub async fn list(&self, rid: i32) -> Response {
        self.list_subs.write().await.push(rid);

        let mut updates = Vec::new();
        let configs = self.configs.read().await;
        if let Some(is) = configs.get("$is") {
            updates.push(serde_json::json!(["$is", is.clone()]));
        } else {
            updates.push(serde_json::json!(["$is", "node"]));
        }
        for (key, value) in configs.iter() {
            if key == "$is" {
                continue;
            }
            updates.push(serde_json::json!([key, value.clone()]));
        }
        drop(configs);

        for (key, value) in self.attributes.read().await.iter() {
            updates.push(serde_json::json!([key, value.clone()]));
        }

        for (name, child) in self.children.read().await.iter() {
            updates.push(serde_json::json!([name, child.to_map().await]));
        }

        Response { rid, stream: Some(StreamState::Open), updates, columns: None, error: None }
    }

    /// Remove `rid` from the list-subscriber set.
    pub async fn close_list(&self, rid: i32) {
        let mut subs = self.list_subs.write().await;
        if let Some(pos) = subs.iter().position(|&r| r == rid) {
            subs.swap_remove(pos);
        }
    }

    pub async fn subscribe(&self, sid: i32) {
        self.value_subs.write().await.push(sid);
    }

    pub async fn unsubscribe(&self, sid: i32) {
        let mut subs = self.value_subs.write().await;
        if let Some(pos) = subs.iter().position(|&s| s == sid) {
            subs.swap_remove(pos);
        }
    }

    /// The value currently held, for an immediate push on fresh subscription.
    pub async fn current_value(&self) -> Value {
        self.value.read().await.value.clone()
    }

    /// Replace the value, then push one update per current subscriber.
    pub async fn update_value(&self, value: Value) {
        self.value.write().await.value = value.clone();

        let subs = self.value_subs.read().await.clone();
        if subs.is_empty() {
            return;
        }
        let ts = now_rfc3339_nanos();
        let updates = subs
            .into_iter()
            .map(|sid| {
                serde_json::to_value(ValueUpdate { ts: ts.clone(), sid, value: value.clone() })
                    .unwrap_or(Value::Null)
            })
            .collect();
        self.tree.push(Response { rid: 0, stream: None, updates, columns: None, error: None });
    }

    async fn notify_list_subscribers(&self, update: Value) {
        let subs = self.list_subs.read().await.clone();
        for rid in subs {
            self.tree.push(Response {
                rid,
                stream: Some(StreamState::Open),
                updates: vec![update.clone()],
                columns: None,
                error: None,
            });
        }
    }

    pub(crate) fn push_response(&self, response: Response) {
        self.tree.push(response);
    }
}

fn default_configs() -> IndexMap<String, Value> {
    let mut configs = IndexMap::new();
    configs.insert("$is".to_owned(), Value::String("node".to_owned()));
    configs
}

fn join_path(parent: &str, child_name: &str) -> String {
    if parent.is_empty() {
        format!("/{child_name}")
    } else {
        format!("{parent}/{child_name}")
    }
}

fn now_rfc3339_nanos() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
