// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Abstract Model Client capability set (§4.6): `start_chat`,
//! `Chat.set_function_definitions`, `Chat.send_streaming`, `list_models`,
//! `close`. Concrete wire protocols are out of scope — this crate only
//! defines the boundary and its generic behaviors (retry, shim).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::types::{FunctionCall, Message, ResponseEvent, ToolSchema};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// A single conversation exclusively owned by the engine's current session,
/// replaced wholesale on `reset` (§9 "Cycles/ownership").
#[async_trait]
pub trait Chat: Send + Sync {
    /// Replace the function-call schema advertised to the model.
    fn set_function_definitions(&mut self, defs: Vec<ToolSchema>);

    /// Send the accumulated chat content and stream back Parts.
    async fn send_streaming(&mut self, parts: Vec<Message>) -> anyhow::Result<ResponseStream>;
}

/// The long-lived client handle (§4.6). Shared with other call sites such as
/// `list_models`; holds no back-reference to any `Chat`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &str;

    /// Start a new chat bound to `model_id`, seeded with `system_prompt`.
    async fn start_chat(&self, system_prompt: &str, model_id: &str) -> anyhow::Result<Box<dyn Chat>>;

    /// List identifiers of models this client can serve.
    async fn list_models(&self) -> anyhow::Result<Vec<String>>;

    /// Release any held resources (connections, background tasks).
    async fn close(&self) -> anyhow::Result<()>;
}

/// Re-exported so callers that only need to inspect a function call's shape
/// don't have to reach into `crate::types`.
pub type ProposedCall = FunctionCall;
