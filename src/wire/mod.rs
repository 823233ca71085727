// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codec-neutral wire types, the JSON/MessagePack codec, and node-name
//! percent-escaping.

pub mod codec;
pub mod message;
pub mod name;

pub use codec::Format;
pub use message::{Message, MsgErr, Request, Response, StreamState, SubPath, ValueUpdate};
