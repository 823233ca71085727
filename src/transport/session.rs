// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session loop: single-writer message framing, msg/ack numbering, and
//! the idle-ping heartbeat. Grounded on `examples/original_source/link/http_client.go`'s
//! `handleConnections` (ping-reset-on-write, `{"msg": N}` heartbeat) and on
//! the teacher's single-writer-via-channel pattern in `upstream/bridge.rs`'s
//! `run_loop`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::wire::codec::Format;
use crate::wire::message::{Message, Request, Response};

/// Interval after which an idle connection sends an empty heartbeat frame.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A batch of outbound requests/responses, not yet stamped with a `msg`
/// number. The session loop owns numbering because only it writes to the
/// socket. `ack` carries the `msg` of the inbound message this batch answers,
/// if any, so it rides the same envelope as the responses it was built from.
#[derive(Debug, Clone, Default)]
pub struct Outbound {
    pub ack: Option<i32>,
    pub requests: Vec<Request>,
    pub responses: Vec<Response>,
}

impl Outbound {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.responses.is_empty()
    }
}

/// Handles for driving a connected session: send outbound batches, receive
/// decoded inbound messages, and a token to tear the session down.
pub struct SessionHandles {
    pub outbound_tx: mpsc::UnboundedSender<Outbound>,
    pub inbound_rx: mpsc::UnboundedReceiver<Message>,
    pub cancel: CancellationToken,
}

/// Spawn the reader and writer tasks for a connected session.
pub fn spawn(ws: Ws, format: Format) -> SessionHandles {
    let cancel = CancellationToken::new();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Message>();

    let (sink, stream) = ws.split();

    tokio::spawn(read_loop(stream, format, inbound_tx, cancel.clone()));
    tokio::spawn(write_loop(sink, format, outbound_rx, cancel.clone()));

    SessionHandles { outbound_tx, inbound_rx, cancel }
}

/// Advance a `msg` counter, wrapping `0x7FFFFFFF` back to `1`.
fn next_msg_id(current: &mut i32) -> i32 {
    let id = *current;
    *current = if *current >= 0x7FFFFFFF { 1 } else { *current + 1 };
    id
}

async fn read_loop(
    mut stream: futures_util::stream::SplitStream<Ws>,
    format: Format,
    inbound_tx: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            frame = stream.next() => {
                match frame {
                    Some(Ok(frame @ (WsFrame::Text(_) | WsFrame::Binary(_)))) => {
                        match format.decode(&frame) {
                            Ok(msg) => {
                                if inbound_tx.send(msg).is_err() {
                                    cancel.cancel();
                                    return;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to decode inbound frame");
                            }
                        }
                    }
                    Some(Ok(WsFrame::Ping(_) | WsFrame::Pong(_))) => {}
                    Some(Ok(WsFrame::Close(_))) | None => {
                        tracing::debug!("session socket closed");
                        cancel.cancel();
                        return;
                    }
                    Some(Ok(WsFrame::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "session socket error");
                        cancel.cancel();
                        return;
                    }
                }
            }
        }
    }
}

async fn write_loop(
    mut sink: futures_util::stream::SplitSink<Ws, WsFrame>,
    format: Format,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
) {
    let mut msg_id: i32 = 1;
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping.reset();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            maybe_out = outbound_rx.recv() => {
                let Some(out) = maybe_out else {
                    cancel.cancel();
                    return;
                };
                let msg = Message {
                    msg: next_msg_id(&mut msg_id),
                    ack: out.ack,
                    requests: out.requests,
                    responses: out.responses,
                    salt: None,
                };
                if !send(&mut sink, format, &msg).await {
                    cancel.cancel();
                    return;
                }
                ping.reset();
            }
            _ = ping.tick() => {
                let msg = Message {
                    msg: next_msg_id(&mut msg_id),
                    ..Default::default()
                };
                if !send(&mut sink, format, &msg).await {
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

async fn send(
    sink: &mut futures_util::stream::SplitSink<Ws, WsFrame>,
    format: Format,
    msg: &Message,
) -> bool {
    let frame = match format.encode(msg) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode outbound message");
            return false;
        }
    };
    if let Err(e) = sink.send(frame).await {
        tracing::warn!(error = %e, "failed to write to session socket");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_id_wraps_at_max() {
        let mut id = 0x7FFFFFFF;
        assert_eq!(next_msg_id(&mut id), 0x7FFFFFFF);
        assert_eq!(id, 1);
        assert_eq!(next_msg_id(&mut id), 1);
        assert_eq!(id, 2);
    }

    #[test]
    fn outbound_empty_check() {
        let out = Outbound::default();
        assert!(out.is_empty());
        let with_req = Outbound { requests: vec![Request::new(1, "list")], ..Default::default() };
        assert!(!with_req.is_empty());
    }
}
