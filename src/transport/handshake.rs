// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `POST /conn` handshake: key bring-up, ECDH shared-secret derivation,
//! and the WebSocket dial. Mirrors `examples/original_source/client/http_client.go`'s
//! `getWsConfig`/`connectWs`, generalized to negotiate either wire format.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::crypto::{self, PrivateKey, PublicKey};
use crate::error::{DsLinkError, HandshakePhase, Result};
use crate::wire::codec::Format;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything the handshake needs to know about the link being brought up.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    pub broker_url: String,
    pub prefix: String,
    pub home: Option<String>,
    pub token: Option<String>,
    pub is_requester: bool,
    pub is_responder: bool,
}

/// Everything the session loop needs once the handshake has succeeded.
pub struct HandshakeOutcome {
    pub ds_id: String,
    pub format: Format,
    pub ws: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    pub salt: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConnBody {
    #[serde(rename = "publicKey")]
    public_key: String,
    #[serde(rename = "isRequester")]
    is_requester: bool,
    #[serde(rename = "isResponder")]
    is_responder: bool,
    #[serde(rename = "linkData")]
    link_data: serde_json::Map<String, serde_json::Value>,
    version: String,
    formats: Vec<String>,
    #[serde(rename = "enableWebSocketCompression")]
    enable_ws_compression: bool,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ConnResponse {
    #[serde(rename = "wsUri")]
    ws_uri: String,
    #[serde(rename = "tempKey")]
    temp_key: String,
    salt: String,
    format: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "publicKey", default)]
    public_key: Option<String>,
    #[serde(rename = "httpUri", default)]
    http_uri: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(rename = "saltS", default)]
    salt_s: Option<String>,
    #[serde(rename = "saltL", default)]
    salt_l: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

/// First 16 characters of `token`, plus whether token binding is enabled.
///
/// Per spec.md §4.1 / §9 REDESIGN notes: the truncation is protocol-mandated
/// and intentionally undocumented upstream; preserved exactly here.
fn truncate_token(token: &str) -> Option<&str> {
    if token.len() < 16 {
        None
    } else {
        Some(&token[..16])
    }
}

/// Run the handshake against `broker_url` using `key`, returning a connected
/// WebSocket and the negotiated format.
pub async fn dial(req: &HandshakeRequest, key: &PrivateKey) -> Result<HandshakeOutcome> {
    let prefix = if req.prefix.ends_with('-') { req.prefix.clone() } else { format!("{}-", req.prefix) };
    let ds_id = crypto::ds_id(key.public_key(), &prefix);

    let truncated_token = req.token.as_deref().and_then(truncate_token);
    let token_hash = truncated_token.map(|t| crypto::hash_token(&ds_id, t));

    let broker_url = Url::parse(&req.broker_url).map_err(|e| DsLinkError::HandshakeFailed {
        phase: HandshakePhase::Url,
        cause: e.to_string(),
    })?;

    let conn_url = build_conn_url(&broker_url, &ds_id, req.home.as_deref(), truncated_token, token_hash.as_deref())
        .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Url, cause: e })?;

    let body = ConnBody {
        public_key: key.public_key().to_base64(),
        is_requester: req.is_requester,
        is_responder: req.is_responder,
        link_data: serde_json::Map::new(),
        version: "1.1.2".to_owned(),
        formats: vec!["msgpack".to_owned(), "json".to_owned()],
        enable_ws_compression: true,
    };

    let client = reqwest::Client::builder()
        .timeout(HANDSHAKE_TIMEOUT)
        .build()
        .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Conn, cause: e.to_string() })?;

    let resp = client
        .post(conn_url)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Conn, cause: e.to_string() })?;

    let conn_resp: ConnResponse = resp
        .json()
        .await
        .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Conn, cause: e.to_string() })?;

    let format = Format::parse(&conn_resp.format)
        .map_err(|_| DsLinkError::UnsupportedFormat(conn_resp.format.clone()))?;

    let server_pub = PublicKey::from_base64(&conn_resp.temp_key)
        .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Crypto, cause: e.to_string() })?;
    let shared = key.shared_secret(&server_pub);
    let auth = crypto::hash_salt(&conn_resp.salt, &shared);

    let ws_url = build_ws_url(
        &broker_url,
        &conn_resp.ws_uri,
        &ds_id,
        &auth,
        format,
        req.home.as_deref(),
        truncated_token,
        token_hash.as_deref(),
    )
    .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Dial, cause: e })?;

    let request = ws_url
        .as_str()
        .into_client_request()
        .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Dial, cause: e.to_string() })?;

    let (mut ws, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Dial, cause: e.to_string() })?;

    // The broker expects one empty-object text frame as the handshake ACK,
    // regardless of the negotiated wire format.
    use futures_util::SinkExt;
    ws.send(tokio_tungstenite::tungstenite::Message::Text("{}".into()))
        .await
        .map_err(|e| DsLinkError::HandshakeFailed { phase: HandshakePhase::Dial, cause: e.to_string() })?;

    Ok(HandshakeOutcome { ds_id, format, ws, salt: Some(conn_resp.salt) })
}

fn build_conn_url(
    broker_url: &Url,
    ds_id: &str,
    home: Option<&str>,
    token: Option<&str>,
    token_hash: Option<&str>,
) -> std::result::Result<Url, String> {
    let mut url = broker_url.clone();
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("dsId", ds_id);
        if let Some(home) = home {
            q.append_pair("home", home);
        }
        if let (Some(token), Some(hash)) = (token, token_hash) {
            q.append_pair("token", &format!("{token}{hash}"));
        }
    }
    Ok(url)
}

#[allow(clippy::too_many_arguments)]
fn build_ws_url(
    broker_url: &Url,
    ws_uri: &str,
    ds_id: &str,
    auth: &str,
    format: Format,
    home: Option<&str>,
    token: Option<&str>,
    token_hash: Option<&str>,
) -> std::result::Result<Url, String> {
    let mut url = broker_url.join(ws_uri).map_err(|e| e.to_string())?;
    url.set_scheme("ws").map_err(|_| "failed to force ws scheme".to_owned())?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("dsId", ds_id);
        q.append_pair("auth", auth);
        q.append_pair("format", format.as_str());
        if let Some(home) = home {
            q.append_pair("home", home);
        }
        if let (Some(token), Some(hash)) = (token, token_hash) {
            q.append_pair("token", &format!("{token}{hash}"));
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_truncation_boundaries() {
        assert_eq!(truncate_token(&"a".repeat(15)), None);
        assert_eq!(truncate_token(&"a".repeat(16)), Some("a".repeat(16)).as_deref());
        assert_eq!(truncate_token(&"a".repeat(17)), Some("a".repeat(16)).as_deref());
    }

    #[test]
    fn conn_url_carries_dsid() {
        let broker = Url::parse("http://broker.example/conn").unwrap();
        let url = build_conn_url(&broker, "Link-abc", None, None, None).unwrap();
        assert!(url.query().unwrap().contains("dsId=Link-abc"));
    }

    #[test]
    fn ws_url_is_forced_to_ws_scheme() {
        let broker = Url::parse("https://broker.example/conn").unwrap();
        let url =
            build_ws_url(&broker, "/ws", "Link-abc", "authtoken", Format::Json, None, None, None)
                .unwrap();
        assert_eq!(url.scheme(), "ws");
        assert!(url.query().unwrap().contains("auth=authtoken"));
        assert!(url.query().unwrap().contains("format=json"));
    }
}
