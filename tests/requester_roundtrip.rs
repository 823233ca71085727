// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end requester calls: a stub broker answers `list` requests issued
//! by a real `Requester` and the resulting `RemoteNode`/update stream is
//! checked.

mod support;

use serde_json::Value;

use dslink::wire::message::{Message, Response, StreamState};
use dslink::{Link, LinkConfig};

#[tokio::test]
#[serial_test::serial]
async fn get_remote_node_assembles_attributes_and_configs() {
    let mut broker = support::spawn_stub_broker().await;
    let config = LinkConfig::requester(broker.broker_url.clone(), "test-remote");
    let link = Link::connect(config).await.expect("handshake should succeed");
    let requester = link.requester.as_ref().expect("requester link has a requester");

    let fetch = requester.get_remote_node("/data");
    let answer = async {
        let req_msg = broker.inbound_rx.recv().await.expect("session should forward the list request");
        let rid = req_msg.requests.first().expect("expected a list request").rid;

        let resp = Response {
            rid,
            stream: Some(StreamState::Closed),
            updates: vec![
                serde_json::json!(["$is", "node"]),
                serde_json::json!(["@label", "Data node"]),
            ],
            columns: None,
            error: None,
        };
        broker
            .outbound_tx
            .send(Message { msg: 2, responses: vec![resp], ..Default::default() })
            .expect("stub broker send should succeed");
    };

    let (node_result, _) = tokio::join!(fetch, answer);
    let node = node_result.expect("get_remote_node should succeed");

    assert_eq!(node.path(), "/data");
    assert_eq!(node.profile().await, "node");
    assert_eq!(node.attribute("@label").await, Some(Value::String("Data node".into())));
}

#[tokio::test]
#[serial_test::serial]
async fn get_remote_node_reports_disconnected() {
    let mut broker = support::spawn_stub_broker().await;
    let config = LinkConfig::requester(broker.broker_url.clone(), "test-disconnected");
    let link = Link::connect(config).await.expect("handshake should succeed");
    let requester = link.requester.as_ref().expect("requester link has a requester");

    let fetch = requester.get_remote_node("/offline");
    let answer = async {
        let req_msg = broker.inbound_rx.recv().await.expect("session should forward the list request");
        let rid = req_msg.requests.first().expect("expected a list request").rid;

        let resp = Response {
            rid,
            stream: Some(StreamState::Closed),
            updates: vec![serde_json::json!(["$disconnectedTs", "2026-01-01T00:00:00Z"])],
            columns: None,
            error: None,
        };
        broker
            .outbound_tx
            .send(Message { msg: 2, responses: vec![resp], ..Default::default() })
            .expect("stub broker send should succeed");
    };

    let (node_result, _) = tokio::join!(fetch, answer);
    assert!(node_result.is_err(), "a disconnected node should surface as an error");
}
