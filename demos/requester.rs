// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal requester: resolves a remote node by path, prints its attributes
//! and configs, then watches `list` updates on it until killed.

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
    let path = std::env::var("DSLINK_PATH").unwrap_or_else(|_| "/data".to_owned());

    let config = LinkConfig::requester(broker_url, "requester-demo").with_on_connected(|| {
        tracing::info!("requester connected");
    });

    let link = match Link::connect(config).await {
        Ok(link) => link,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect");
            std::process::exit(1);
        }
    };

    let Some(requester) = link.requester.as_ref() else {
        tracing::error!("link did not bring up a requester");
        std::process::exit(1);
    };

    match requester.get_remote_node(&path).await {
        Ok(node) => {
            tracing::info!(
                path = node.path(),
                profile = %node.profile().await,
                configs = ?node.configs_snapshot().await,
                attributes = ?node.attributes_snapshot().await,
                "resolved remote node"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to resolve remote node");
            std::process::exit(1);
        }
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let rid = requester.list(&path, tx).await;
    while let Some(update) = rx.recv().await {
        tracing::info!(?update, "list update");
    }
    requester.close_request(rid).await;
}
