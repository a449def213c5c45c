// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Model Client Adapter (C6): an abstract streaming chat API over LLM
//! providers, a retry wrapper, tool-schema registration, and a shim for
//! models without native function-calling (§4.6).
//!
//! This crate defines only the boundary (`ModelClient`/`Chat`) and its
//! generic behaviors. Concrete wire protocols for specific providers are
//! out of scope (§1, "the LLM provider wire protocols themselves (treated
//! as an abstract Model Client)") — callers bring their own `ModelClient`
//! implementation, or use [`ScriptedMockClient`] for tests.

mod provider;
mod retry;
mod shim;
mod types;

mod mock;

pub use mock::{tool_call_script, text_script, Script, ScriptedChat, ScriptedMockClient};
pub use provider::{Chat, ModelClient, ProposedCall, ResponseStream};
pub use retry::{retry_with_backoff, RetryConfig};
pub use shim::{ShimChat, ShimParseError, ShimPayload};
pub use types::{FunctionCall, Message, MessageContent, Part, ResponseEvent, Role, ToolSchema};
