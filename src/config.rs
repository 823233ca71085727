// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Link configuration.
//!
//! This is a plain struct, not a `clap::Args` derive: flag/env parsing and
//! `dslink.json` loading are the embedding application's job, not this
//! crate's. See `examples/original_source/link/http_client.go`'s `Config`
//! for the field set this generalizes.

use std::sync::Arc;

use crate::crypto::PrivateKey;

/// Where a link's private key comes from.
///
/// Key persistence to disk is out of scope for this crate; callers that want
/// a stable `dsId` across restarts load bytes from wherever they like and
/// pass them in via [`KeySource::Persisted`], using
/// [`PrivateKey::to_persist_string`]/[`PrivateKey::from_persist_str`] to
/// serialize.
#[derive(Clone)]
pub enum KeySource {
    /// Generate a fresh P-256 key pair on every bring-up. The `dsId` will
    /// change across restarts.
    Generate,
    /// Reuse a previously-generated key, keeping the `dsId` stable.
    Persisted(PrivateKey),
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => f.write_str("KeySource::Generate"),
            Self::Persisted(_) => f.write_str("KeySource::Persisted(..)"),
        }
    }
}

impl KeySource {
    pub(crate) fn resolve(&self) -> PrivateKey {
        match self {
            Self::Generate => PrivateKey::generate(),
            Self::Persisted(key) => key.clone(),
        }
    }
}

/// Called once, the first time a session handshake completes.
pub type OnConnected = Arc<dyn Fn() + Send + Sync>;

/// Configuration for bringing up a link to a broker.
#[derive(Clone)]
pub struct LinkConfig {
    /// Broker base URL, e.g. `http://localhost:8080/conn`.
    pub broker_url: String,

    /// `dsId` prefix; the final `dsId` is `<prefix>-<base64url(sha256(publicKey))>`.
    pub prefix: String,

    /// Optional `home` path advertised during the handshake.
    pub home: Option<String>,

    /// Optional auth token. Only the first 16 characters are ever sent on
    /// the wire; see `transport::handshake`.
    pub token: Option<String>,

    /// Whether this link exposes a node tree to the broker.
    pub is_responder: bool,

    /// Whether this link consumes a remote node tree.
    pub is_requester: bool,

    /// Where the private key comes from.
    pub key_source: KeySource,

    /// Invoked once per successful handshake completion.
    pub on_connected: Option<OnConnected>,
}

impl std::fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConfig")
            .field("broker_url", &self.broker_url)
            .field("prefix", &self.prefix)
            .field("home", &self.home)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("is_responder", &self.is_responder)
            .field("is_requester", &self.is_requester)
            .field("key_source", &self.key_source)
            .field("on_connected", &self.on_connected.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl LinkConfig {
    /// A responder-only config with a generated key, no token, no home path.
    pub fn responder(broker_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            prefix: prefix.into(),
            home: None,
            token: None,
            is_responder: true,
            is_requester: false,
            key_source: KeySource::Generate,
            on_connected: None,
        }
    }

    /// A requester-only config with a generated key, no token, no home path.
    pub fn requester(broker_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            prefix: prefix.into(),
            home: None,
            token: None,
            is_responder: false,
            is_requester: true,
            key_source: KeySource::Generate,
            on_connected: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_home(mut self, home: impl Into<String>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_key_source(mut self, key_source: KeySource) -> Self {
        self.key_source = key_source;
        self
    }

    pub fn with_on_connected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(f));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responder_preset_sets_flags() {
        let cfg = LinkConfig::responder("http://localhost:8080/conn", "Link");
        assert!(cfg.is_responder);
        assert!(!cfg.is_requester);
    }

    #[test]
    fn token_is_redacted_in_debug() {
        let cfg = LinkConfig::responder("http://localhost:8080/conn", "Link").with_token("supersecrettoken123");
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("supersecrettoken123"));
        assert!(debug.contains("redacted"));
    }
}
