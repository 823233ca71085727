// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal responder: exposes a single `/counter` value node and a
//! `/increment` action, then idles until the process is killed.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::Value;

use dslink::node::{InvokeDef, Permission, ResultType};
use dslink::{Link, LinkConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let broker_url =
        std::env::var("DSLINK_BROKER").unwrap_or_else(|_| "http://localhost:8080/conn".to_owned());

    let config = LinkConfig::responder(broker_url, "responder-demo").with_on_connected(|| {
        tracing::info!("responder connected");
    });

    let link = match Link::connect(config).await {
        Ok(link) => link,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect");
            std::process::exit(1);
        }
    };

    let Some(provider) = link.provider.as_ref() else {
        tracing::error!("link did not bring up a provider");
        std::process::exit(1);
    };

    let counter = Arc::new(AtomicI64::new(0));
    let counter_node = provider.new_node("counter");
    counter_node.update_value(Value::from(0)).await;
    provider.root().add_child(Arc::clone(&counter_node)).await;

    let increment_node = provider.new_node("increment");
    let counter_for_handler = Arc::clone(&counter);
    let counter_node_for_handler = Arc::clone(&counter_node);
    increment_node
        .set_invoke(InvokeDef {
            columns: vec![],
            result: ResultType::Values,
            invokable: Permission::Write,
            handler: Arc::new(move |_params, tx| {
                let counter = Arc::clone(&counter_for_handler);
                let counter_node = Arc::clone(&counter_node_for_handler);
                Box::pin(async move {
                    let next = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    counter_node.update_value(Value::from(next)).await;
                    let _ = tx.send(vec![]).await;
                })
            }),
        })
        .await;
    provider.root().add_child(Arc::clone(&increment_node)).await;

    tracing::info!(ds_id = %link.ds_id, "responder node tree ready");
    std::future::pending::<()>().await;
}
