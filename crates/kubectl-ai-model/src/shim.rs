// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Shim mode (§4.6): converts streamed text from a model without native
//! function-calling into the same `Part` shape a native model would have
//! produced, using a fenced-JSON convention.
//!
//! The shim is strictly a parser at this layer (§9, "Shim as parser, not as
//! transport") — [`ShimChat`] wraps an inner [`Chat`] whose underlying model
//! only emits text, accumulates that text until a fenced JSON block
//! terminated by a closing fence is observed, and yields synthetic
//! [`ResponseEvent`]s from it.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use crate::provider::{Chat, ResponseStream};
use crate::types::{FunctionCall, Message, Part, ResponseEvent, ToolSchema};

/// The parsed shape of a shim fenced-JSON block: `{thought, answer?,
/// action?: {name, ...}}` (§4.6).
#[derive(Debug, Clone, Deserialize)]
pub struct ShimPayload {
    pub thought: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub action: Option<ShimAction>,
}

/// `action.name` plus whatever other fields the model supplied (`reason`,
/// `command`, `modifies_resource`, ...). Kept as an object map so every
/// remaining field minus `name` becomes the function call's arguments.
#[derive(Debug, Clone)]
pub struct ShimAction {
    pub name: String,
    pub rest: serde_json::Map<String, Value>,
}

impl<'de> Deserialize<'de> for ShimAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut map = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        let name = map
            .remove("name")
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| serde::de::Error::missing_field("name"))?;
        Ok(ShimAction { name, rest: map })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShimParseError {
    #[error("no fenced JSON block found in model output")]
    NoFencedBlock,
    #[error("fenced block is not valid shim JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Locate the first fenced block (``` or ```json, terminated by a closing
/// ```` ``` ````) and parse its contents as a [`ShimPayload`].
pub fn parse_shim_text(text: &str) -> Result<ShimPayload, ShimParseError> {
    let body = extract_fenced_block(text).ok_or(ShimParseError::NoFencedBlock)?;
    Ok(serde_json::from_str(&body)?)
}

fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_open = start + 3;
    // Skip an optional language tag (e.g. "json") up to the next newline.
    let rest = &text[after_open..];
    let content_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body_and_tail = &rest[content_start..];
    let end = body_and_tail.find("```")?;
    Some(body_and_tail[..end].trim().to_string())
}

/// Convert a parsed [`ShimPayload`] into the synthetic `Part`s the engine
/// consumes exactly as a native response would produce them (§4.6, property
/// 7): a text part for `thought`, a text part for `answer` if present, and
/// a single function-call part iff `action` is present.
pub fn payload_to_parts(payload: ShimPayload) -> Vec<Part> {
    let mut parts = Vec::new();
    parts.push(Part::Text(payload.thought));
    if let Some(answer) = payload.answer {
        parts.push(Part::Text(answer));
    }
    if let Some(action) = payload.action {
        parts.push(Part::FunctionCalls(vec![FunctionCall {
            id: None,
            name: action.name,
            arguments: Value::Object(action.rest),
        }]));
    }
    parts
}

/// Wraps an inner [`Chat`] whose model only emits text. Accumulates text
/// deltas from the inner stream until a closed fenced block appears, then
/// emits the synthetic parts described above followed by `Done`.
///
/// A malformed block does not fail the call outright — it surfaces as a
/// single `ResponseEvent::Error` carrying the raw accumulated text, so the
/// engine can feed it back to the model as a `ValidationError` observation
/// (§7) rather than aborting the turn.
pub struct ShimChat {
    inner: Box<dyn Chat>,
}

impl ShimChat {
    pub fn new(inner: Box<dyn Chat>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Chat for ShimChat {
    fn set_function_definitions(&mut self, _defs: Vec<ToolSchema>) {
        // Shim-mode models have no native function-calling surface; the
        // tool manifest is rendered into the system prompt instead (C7), so
        // there is nothing to register here.
    }

    async fn send_streaming(&mut self, parts: Vec<Message>) -> anyhow::Result<ResponseStream> {
        let mut inner_stream = self.inner.send_streaming(parts).await?;
        let mut accumulated = String::new();
        while let Some(event) = inner_stream.next().await {
            match event? {
                ResponseEvent::Part(Part::Text(t)) => accumulated.push_str(&t),
                ResponseEvent::Part(Part::FunctionCalls(_)) => {
                    // A shim-mode backing model should never emit native
                    // function calls; ignore rather than fail the turn.
                }
                ResponseEvent::Error(e) => {
                    return Ok(Box::pin(futures::stream::once(async move {
                        Ok(ResponseEvent::Error(e))
                    })));
                }
                ResponseEvent::Done => break,
            }
        }

        let events: Vec<anyhow::Result<ResponseEvent>> = match parse_shim_text(&accumulated) {
            Ok(payload) => {
                let mut out: Vec<anyhow::Result<ResponseEvent>> = payload_to_parts(payload)
                    .into_iter()
                    .map(|p| Ok(ResponseEvent::Part(p)))
                    .collect();
                out.push(Ok(ResponseEvent::Done));
                out
            }
            Err(_) => vec![Ok(ResponseEvent::Error(accumulated))],
        };
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
