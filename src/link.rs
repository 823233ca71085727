// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The link supervisor: wires the handshake, the session loop, and the
//! provider/requester engines together and owns the central select loop.
//!
//! Grounded on `examples/original_source/link/http_client.go`'s
//! `handleConnections` for the overall shape (one loop fanning inbound
//! traffic to handlers, one outbound path), generalized to spawn a
//! per-message handler task per spec so a slow request never blocks the
//! next inbound frame from being read.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{LinkConfig, OnConnected};
use crate::error::Result;
use crate::provider::Provider;
use crate::requester::Requester;
use crate::transport::handshake::{self, HandshakeRequest};
use crate::transport::session::{self, Outbound};
use crate::wire::message::{Message, Request, Response};

/// A live, connected link. Drop or call [`Link::shutdown`] to tear it down.
pub struct Link {
    pub ds_id: String,
    pub provider: Option<Arc<Provider>>,
    pub requester: Option<Arc<Requester>>,
    cancel: CancellationToken,
}

impl Link {
    /// Perform the handshake, bring up the session loop, and start the
    /// supervisor task.
    pub async fn connect(config: LinkConfig) -> Result<Self> {
        let key = config.key_source.resolve();
        let handshake_req = HandshakeRequest {
            broker_url: config.broker_url.clone(),
            prefix: config.prefix.clone(),
            home: config.home.clone(),
            token: config.token.clone(),
            is_requester: config.is_requester,
            is_responder: config.is_responder,
        };

        let outcome = handshake::dial(&handshake_req, &key).await?;
        let ds_id = outcome.ds_id;
        let handles = session::spawn(outcome.ws, outcome.format);

        let provider_pair = if config.is_responder { Some(Provider::new()) } else { None };
        let requester_pair = if config.is_requester { Some(Requester::new()) } else { None };

        let provider_arc = provider_pair.map(|(p, rx)| (Arc::new(p), rx));
        let requester_arc = requester_pair.map(|(r, rx)| (Arc::new(r), rx));

        let provider_handle = provider_arc.as_ref().map(|(p, _)| Arc::clone(p));
        let requester_handle = requester_arc.as_ref().map(|(r, _)| Arc::clone(r));

        let cancel = handles.cancel.clone();
        tokio::spawn(run_supervisor(
            handles.outbound_tx,
            handles.inbound_rx,
            provider_arc,
            requester_arc,
            config.on_connected.clone(),
            cancel.clone(),
        ));

        Ok(Self { ds_id, provider: provider_handle, requester: requester_handle, cancel })
    }

    /// Tear down the session: both transport tasks and the supervisor loop
    /// observe cancellation and stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn recv_opt<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_supervisor(
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    mut inbound_rx: mpsc::UnboundedReceiver<Message>,
    provider: Option<(Arc<Provider>, mpsc::UnboundedReceiver<Response>)>,
    requester: Option<(Arc<Requester>, mpsc::UnboundedReceiver<Request>)>,
    on_connected: Option<OnConnected>,
    cancel: CancellationToken,
) {
    let (provider, mut provider_rx) = split_pair(provider);
    let (requester, mut requester_rx) = split_pair(requester);
    let mut salt_seen = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,

            maybe_msg = inbound_rx.recv() => {
                let Some(msg) = maybe_msg else {
                    cancel.cancel();
                    return;
                };
                if msg.is_empty() {
                    continue;
                }

                if msg.salt.is_some() && !salt_seen {
                    salt_seen = true;
                    if let Some(f) = on_connected.clone() {
                        f();
                    }
                }

                let ack = msg.msg;
                let provider = provider.clone();
                let requester = requester.clone();
                let outbound_tx = outbound_tx.clone();
                tokio::spawn(async move {
                    for resp in msg.responses {
                        if let Some(requester) = &requester {
                            requester.handle_response(resp).await;
                        }
                    }

                    let mut responses = Vec::new();
                    for req in msg.requests {
                        if let Some(provider) = &provider {
                            if let Some(resp) = provider.handle_request(req).await {
                                responses.push(resp);
                            }
                        }
                    }

                    let _ = outbound_tx.send(Outbound { ack: Some(ack), requests: vec![], responses });
                });
            }

            Some(resp) = recv_opt(&mut provider_rx) => {
                let _ = outbound_tx.send(Outbound { ack: None, requests: vec![], responses: vec![resp] });
            }

            Some(req) = recv_opt(&mut requester_rx) => {
                let _ = outbound_tx.send(Outbound { ack: None, requests: vec![req], responses: vec![] });
            }
        }
    }
}

fn split_pair<A, B>(pair: Option<(A, B)>) -> (Option<A>, Option<B>) {
    match pair {
        Some((a, b)) => (Some(a), Some(b)),
        None => (None, None),
    }
}
