// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! P-256 key pairs, dsId derivation, and shared-secret/token hashing.
//!
//! Grounded on the key-agreement shape used by `ochra-crypto`'s `x25519`
//! module (`examples/lyrahos-emunet/crates/ochra-crypto/src/x25519.rs`):
//! a thin wrapper struct around a RustCrypto key type with explicit
//! byte-level `to_bytes`/`from_bytes` round-trips, plus the original
//! Go SDK's marshal shape (`examples/original_source/crypto/pk.go`).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey as P256PublicKey, SecretKey};
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{DsLinkError, Result};

/// A P-256 public key, marshalled as an uncompressed SEC1 point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    inner: P256PublicKey,
}

impl PublicKey {
    /// The uncompressed SEC1 point encoding of this key.
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.inner.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Raw-URL-Base64 (no padding) encoding of the SEC1 point.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_sec1_bytes())
    }

    /// sha256 of the SEC1 point, Raw-URL-Base64 encoded.
    pub fn hash64(&self) -> String {
        let digest = Sha256::digest(self.to_sec1_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Decode a Raw-URL-Base64-encoded SEC1 point.
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes =
            URL_SAFE_NO_PAD.decode(s).map_err(|e| DsLinkError::Key(format!("bad public key: {e}")))?;
        let inner = P256PublicKey::from_sec1_bytes(&bytes)
            .map_err(|e| DsLinkError::BadServerKey(e.to_string()))?;
        Ok(Self { inner })
    }
}

/// A P-256 private key, plus its derived public key.
#[derive(Clone)]
pub struct PrivateKey {
    secret: SecretKey,
    public: PublicKey,
}

impl PrivateKey {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = PublicKey { inner: secret.public_key() };
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Compute the ECDH shared secret with a peer's public key.
    pub fn shared_secret(&self, peer: &PublicKey) -> Vec<u8> {
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.inner.as_affine());
        shared.raw_secret_bytes().to_vec()
    }

    /// Serialize as `"<base64url(D)> <base64url(point)>"`, matching the
    /// original SDK's on-disk key format.
    pub fn to_persist_string(&self) -> String {
        let d = URL_SAFE_NO_PAD.encode(self.secret.to_bytes());
        format!("{} {}", d, self.public.to_base64())
    }

    /// Parse the persisted key format. A single token (just `D`) is also
    /// accepted; the public key is recomputed from it.
    pub fn from_persist_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let d_str =
            parts.next().ok_or_else(|| DsLinkError::Key("empty key string".to_owned()))?;
        let d_bytes = URL_SAFE_NO_PAD
            .decode(d_str)
            .map_err(|e| DsLinkError::Key(format!("bad private scalar: {e}")))?;
        let secret = SecretKey::from_slice(&d_bytes)
            .map_err(|e| DsLinkError::Key(format!("bad private scalar: {e}")))?;
        let public = PublicKey { inner: secret.public_key() };

        if let Some(extra) = parts.next() {
            if parts.next().is_some() {
                return Err(DsLinkError::Key("too many sections to unmarshal".to_owned()));
            }
            let parsed_public = PublicKey::from_base64(extra)?;
            if parsed_public != public {
                // The stored point doesn't match the scalar: trust the scalar,
                // matching the Go implementation's "Unmarshal" two-token path
                // (it reconstructs nothing here, it simply pairs D with the
                // token-supplied point). We recompute instead so a corrupted
                // on-disk point can never desync private/public halves.
                tracing::warn!("persisted public key did not match private scalar; recomputing");
            }
        }

        Ok(Self { secret, public })
    }
}

/// Derive the stable dsId: `<prefix><base64url(sha256(publicKey))>`.
///
/// `prefix` is forced to end in `-` if it doesn't already.
pub fn ds_id(public: &PublicKey, prefix: &str) -> String {
    let prefix = if prefix.ends_with('-') { prefix.to_owned() } else { format!("{prefix}-") };
    format!("{prefix}{}", public.hash64())
}

/// Verify that `candidate` is the dsId derived from `public` under `prefix`.
pub fn verify_ds_id(candidate: &str, public: &PublicKey, prefix: &str) -> bool {
    candidate == ds_id(public, prefix)
}

/// `base64url(sha256(salt || secret))`, used both for the WS `auth` query
/// parameter and for token binding.
pub fn hash_salt(salt: &str, secret: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// `base64url(sha256(dsId || token))`, used to derive the token hash
/// appended to the truncated token before it is sent on the wire.
pub fn hash_token(ds_id: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ds_id.as_bytes());
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
