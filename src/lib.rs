// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A client library for the DSA broker protocol: handshake, session framing,
//! and a node tree for both responder and requester roles.
//!
//! Bring up a link with [`LinkConfig`] and [`Link::connect`], then either
//! build a node tree under [`Link::provider`]'s root or issue requests
//! through [`Link::requester`].

pub mod config;
pub mod crypto;
pub mod error;
pub mod link;
pub mod node;
pub mod provider;
pub mod requester;
pub mod transport;
pub mod wire;

pub use config::{KeySource, LinkConfig};
pub use error::{DsLinkError, Result};
pub use link::Link;
pub use node::{LocalNode, Permission, RemoteNode, ResultType};
pub use provider::Provider;
pub use requester::Requester;
