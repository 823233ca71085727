// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Every inbound message that carries a `msg` must be acked with its own
//! `msg` value, even when several inbound messages are mid-handling at once
//! (each gets its own spawned task in the supervisor loop).

mod support;

use std::sync::Arc;

use serde_json::Value;

use dslink::wire::message::{method, Message, Request};
use dslink::{Link, LinkConfig};

#[tokio::test]
#[serial_test::serial]
async fn concurrent_inbound_messages_each_keep_their_own_ack() {
    let mut broker = support::spawn_stub_broker().await;
    let config = LinkConfig::responder(broker.broker_url.clone(), "test-ack");
    let link = Link::connect(config).await.expect("handshake should succeed");
    let provider = link.provider.as_ref().expect("responder link has a provider");

    let value_node = provider.new_node("value");
    value_node.update_value(Value::from(1)).await;
    provider.root().add_child(Arc::clone(&value_node)).await;

    // The stub broker already pushed its greeting (msg=1, salt only) the
    // moment the socket opened. Queue a second inbound message (msg=2, a
    // list request) right away, without waiting on any response in between,
    // so both land in the link's inbound channel before either spawned
    // handler's `Outbound` has had a chance to drain.
    broker
        .outbound_tx
        .send(Message {
            msg: 2,
            requests: vec![Request { path: Some("/".into()), ..Request::new(1, method::LIST) }],
            ..Default::default()
        })
        .expect("stub broker send should succeed");

    let mut acked = Vec::new();
    while acked.len() < 2 {
        let msg = broker.inbound_rx.recv().await.expect("session should answer both messages");
        if let Some(ack) = msg.ack {
            acked.push(ack);
        }
    }

    acked.sort_unstable();
    assert_eq!(acked, vec![1, 2], "msg=1 (greeting) and msg=2 (list) must each produce their own ack");
}
