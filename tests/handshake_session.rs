// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end handshake + session bring-up against the stub broker.

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dslink::{Link, LinkConfig};

#[tokio::test]
#[serial_test::serial]
async fn responder_link_completes_handshake() {
    let broker = support::spawn_stub_broker().await;
    let config = LinkConfig::responder(broker.broker_url.clone(), "test-responder");

    let link = Link::connect(config).await.expect("handshake against stub broker should succeed");
    assert!(link.ds_id.starts_with("test-responder-"));
    assert!(link.provider.is_some());
    assert!(link.requester.is_none());
}

#[tokio::test]
#[serial_test::serial]
async fn requester_link_has_no_provider() {
    let broker = support::spawn_stub_broker().await;
    let config = LinkConfig::requester(broker.broker_url.clone(), "test-requester");

    let link = Link::connect(config).await.expect("handshake against stub broker should succeed");
    assert!(link.requester.is_some());
    assert!(link.provider.is_none());
}

#[tokio::test]
#[serial_test::serial]
async fn on_connected_fires_once_salt_arrives() {
    let broker = support::spawn_stub_broker().await;
    let fired = Arc::new(AtomicBool::new(false));
    let fired_for_cb = Arc::clone(&fired);

    let config = LinkConfig::responder(broker.broker_url.clone(), "test-salt")
        .with_on_connected(move || fired_for_cb.store(true, Ordering::SeqCst));

    let _link = Link::connect(config).await.expect("handshake should succeed");

    // The stub broker's first session frame carries salt; give the
    // supervisor a moment to process it.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(fired.load(Ordering::SeqCst));
}
