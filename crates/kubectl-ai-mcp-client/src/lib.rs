// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Remote Tool Broker (C5): discovers and calls tools hosted on external
//! tool servers over a pipe (stdio child process) or network (HTTP)
//! transport, described generically as "a JSON-RPC-flavored protocol" (§4.5).
//!
//! This crate does not bind to any external MCP client library — the
//! corpus's own MCP dependency is server-side only and no client-side
//! reference exists to ground an adoption on (see `DESIGN.md`), so the
//! envelope, transports, and lifecycle here are hand-rolled against the
//! protocol shape the specification describes.

mod broker;
mod coerce;
mod lifecycle;
mod protocol;
mod remote_tool;
mod transport;

pub use broker::connect_all;
pub use coerce::{coerce_arguments, snake_to_camel};
pub use lifecycle::{ConnectionState, FailedAt};
pub use protocol::{
    ClientInfo, ContentBlock, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RemoteToolDescriptor,
    ToolCallResult, ToolsListResult, PROTOCOL_VERSION,
};
pub use remote_tool::RemoteTool;
pub use transport::{HttpTransport, PipeTransport, Transport, TransportError};
