// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A tiny in-process stub broker playing the server side of the handshake
//! and session loop, so integration tests can drive a real `Link` over a
//! real TCP socket without a real DSA broker.
//!
//! Always negotiates the `json` format; `codec.rs`'s own tests already
//! cover MessagePack round-tripping in isolation.

use std::sync::Arc;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};

use dslink::crypto::PrivateKey;
use dslink::wire::message::Message as SessionMessage;

const STUB_SALT: &str = "stub-broker-salt";

struct BrokerState {
    server_key: PrivateKey,
    inbound_tx: mpsc::UnboundedSender<SessionMessage>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionMessage>>>,
}

/// A running stub broker. Drop the struct (or let the test end) to let the
/// listener task leak for the remainder of the test process; each test binds
/// an ephemeral port so this never collides across tests in the same run.
pub struct StubBroker {
    pub broker_url: String,
    pub inbound_rx: mpsc::UnboundedReceiver<SessionMessage>,
    pub outbound_tx: mpsc::UnboundedSender<SessionMessage>,
}

/// Bring up a stub broker on an ephemeral localhost port and return a handle
/// to its inbound/outbound session-message channels.
pub async fn spawn_stub_broker() -> StubBroker {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let state = Arc::new(BrokerState {
        server_key: PrivateKey::generate(),
        inbound_tx,
        outbound_rx: Mutex::new(Some(outbound_rx)),
    });

    let app = Router::new()
        .route("/conn", post(handle_conn))
        .route("/ws", get(handle_ws))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub broker");
    let addr = listener.local_addr().expect("stub broker local addr");

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    StubBroker { broker_url: format!("http://{addr}/conn"), inbound_rx, outbound_tx }
}

async fn handle_conn(State(state): State<Arc<BrokerState>>, Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({
        "wsUri": "/ws",
        "tempKey": state.server_key.public_key().to_base64(),
        "salt": STUB_SALT,
        "format": "json",
    }))
}

async fn handle_ws(ws: WebSocketUpgrade, State(state): State<Arc<BrokerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: Arc<BrokerState>) {
    // Drain the handshake-ack empty-object text frame.
    let _ = socket.recv().await;

    // Real brokers deliver the session salt as the first frame of the
    // session proper, distinct from the salt already used to derive `auth`
    // during the handshake; send it so `on_connected` has something to fire
    // on.
    let greeting = SessionMessage { msg: 1, salt: Some(STUB_SALT.to_owned()), ..Default::default() };
    if socket.send(AxumMessage::Text(serde_json::to_string(&greeting).unwrap().into())).await.is_err() {
        return;
    }

    let mut outbound_rx =
        state.outbound_rx.lock().await.take().expect("stub broker websocket opened twice");

    loop {
        tokio::select! {
            frame = socket.recv() => {
                match frame {
                    Some(Ok(AxumMessage::Text(text))) => {
                        if let Ok(msg) = serde_json::from_str::<SessionMessage>(&text) {
                            let _ = state.inbound_tx.send(msg);
                        }
                    }
                    Some(Ok(AxumMessage::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return,
                }
            }
            maybe_out = outbound_rx.recv() => {
                let Some(out) = maybe_out else { return };
                let text = serde_json::to_string(&out).unwrap();
                if socket.send(AxumMessage::Text(text.into())).await.is_err() {
                    return;
                }
            }
        }
    }
}
