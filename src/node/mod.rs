// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The node tree: `LocalNode` (responder side) and `RemoteNode` (requester
//! side mirror).

pub mod local;
pub mod remote;

pub use local::{
    BoxFuture, Column, InvokeDef, LocalNode, Permission, ResultType, RowSender, SetHandlerFn,
    ValueType,
};
pub use remote::RemoteNode;
