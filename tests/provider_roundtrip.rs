// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end provider dispatch: a stub broker issues `list`/`subscribe`/
//! `invoke` requests over a real session and checks the responses that come
//! back.

mod support;

use std::sync::Arc;

use serde_json::Value;

use dslink::node::{InvokeDef, Permission, ResultType};
use dslink::wire::message::{method, Message, Request, StreamState, SubPath};
use dslink::{Link, LinkConfig};

#[tokio::test]
#[serial_test::serial]
async fn list_root_reports_children() {
    let mut broker = support::spawn_stub_broker().await;
    let config = LinkConfig::responder(broker.broker_url.clone(), "test-list");
    let link = Link::connect(config).await.expect("handshake should succeed");
    let provider = link.provider.as_ref().expect("responder link has a provider");

    let value_node = provider.new_node("value");
    value_node.update_value(Value::from(42)).await;
    provider.root().add_child(Arc::clone(&value_node)).await;

    broker
        .outbound_tx
        .send(Message {
            msg: 2,
            requests: vec![Request { path: Some("/".into()), ..Request::new(1, method::LIST) }],
            ..Default::default()
        })
        .expect("stub broker send should succeed");

    let response = loop {
        let msg = broker.inbound_rx.recv().await.expect("session should answer list");
        if let Some(resp) = msg.responses.into_iter().find(|r| r.rid == 1) {
            break resp;
        }
    };

    assert_eq!(response.stream, Some(StreamState::Open));
    let has_value_child = response.updates.iter().any(|u| u.get(0) == Some(&Value::String("value".into())));
    assert!(has_value_child, "expected a [\"value\", {{..}}] update, got {:?}", response.updates);
}

#[tokio::test]
#[serial_test::serial]
async fn subscribe_pushes_current_value() {
    let mut broker = support::spawn_stub_broker().await;
    let config = LinkConfig::responder(broker.broker_url.clone(), "test-sub");
    let link = Link::connect(config).await.expect("handshake should succeed");
    let provider = link.provider.as_ref().expect("responder link has a provider");

    let value_node = provider.new_node("temperature");
    value_node.update_value(Value::from(71)).await;
    provider.root().add_child(Arc::clone(&value_node)).await;

    broker
        .outbound_tx
        .send(Message {
            msg: 2,
            requests: vec![Request {
                paths: vec![SubPath { path: "/temperature".into(), sid: 9, qos: None }],
                ..Request::new(3, method::SUBSCRIBE)
            }],
            ..Default::default()
        })
        .expect("stub broker send should succeed");

    // The subscribe ack and the async rid-0 value push may arrive in either
    // relative order on the wire, so scan a few frames for the push.
    let mut saw_ack = false;
    let mut saw_push = false;
    for _ in 0..5 {
        let msg = broker.inbound_rx.recv().await.expect("session should answer subscribe");
        for resp in &msg.responses {
            if resp.rid == 3 && resp.stream == Some(StreamState::Closed) {
                saw_ack = true;
            }
            if resp.rid == 0 {
                let carries_sid_9 = resp.updates.iter().any(|u| u.get("sid") == Some(&Value::from(9)));
                if carries_sid_9 {
                    saw_push = true;
                }
            }
        }
        if saw_ack && saw_push {
            break;
        }
    }
    assert!(saw_ack, "expected a subscribe ack with stream=closed");
    assert!(saw_push, "expected an async rid-0 push carrying sid 9's current value");
}

#[tokio::test]
#[serial_test::serial]
async fn invoke_streams_rows_then_closes() {
    let mut broker = support::spawn_stub_broker().await;
    let config = LinkConfig::responder(broker.broker_url.clone(), "test-invoke");
    let link = Link::connect(config).await.expect("handshake should succeed");
    let provider = link.provider.as_ref().expect("responder link has a provider");

    let action_node = provider.new_node("double");
    action_node
        .set_invoke(InvokeDef {
            columns: vec![],
            result: ResultType::Stream,
            invokable: Permission::Write,
            handler: Arc::new(|params, tx| {
                Box::pin(async move {
                    let n = params.get("n").and_then(Value::as_i64).unwrap_or(0);
                    let _ = tx.send(vec![Value::from(n * 2)]).await;
                })
            }),
        })
        .await;
    provider.root().add_child(Arc::clone(&action_node)).await;

    broker
        .outbound_tx
        .send(Message {
            msg: 2,
            requests: vec![Request {
                path: Some("/double".into()),
                permit: Some("write".into()),
                params: Some(serde_json::json!({"n": 21}).as_object().cloned().unwrap()),
                ..Request::new(4, method::INVOKE)
            }],
            ..Default::default()
        })
        .expect("stub broker send should succeed");

    let mut rows = Vec::new();
    let mut closed = false;
    while !closed {
        let msg = broker.inbound_rx.recv().await.expect("session should answer invoke");
        for resp in &msg.responses {
            if resp.rid != 4 {
                continue;
            }
            rows.extend(resp.updates.clone());
            if resp.stream == Some(StreamState::Closed) {
                closed = true;
            }
        }
    }

    assert!(rows.iter().any(|r| r == &Value::Array(vec![Value::from(42)])));
}
