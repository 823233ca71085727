// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ECDH key management and the hashes used by the handshake.

mod key;

pub use key::{ds_id, hash_salt, hash_token, verify_ds_id, PrivateKey, PublicKey};
