// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Session Store (C2): ordered chat message history plus session metadata.
//!
//! The store is content-oblivious (§4.2, "exposes no hooks into message
//! semantics") — it knows how to append, replace, snapshot and clear, and
//! nothing about what a tool-call-request means.

mod agent_state;
mod message;
mod remote_tool_status;
mod session;
mod store;

pub use agent_state::AgentState;
pub use message::{InvalidCombination, Message, Payload, Source};
pub use remote_tool_status::{ConnectionStage, DiscoveredTool, RemoteServerSnapshot, RemoteToolStatus};
pub use session::{Session, SessionMetadata};
pub use store::{
    next_session_id, FilesystemSessionStore, InMemorySessionStore, SessionStore, SessionSummary,
    StoreError,
};
