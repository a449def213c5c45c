// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Wire-agnostic chat types (§4.6): a `Part` is text or a function call, a
//! `FunctionCall` carries a structured argument map rather than a
//! JSON-encoded string, and a `ToolSchema` mirrors what the registry hands
//! the Prompt Builder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One role-tagged turn fed into `Chat.send_streaming` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult { tool_call_id: id.into(), content: content.into() },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    ToolCall { tool_call_id: String, function: FunctionCall },
    ToolResult { tool_call_id: String, content: String },
}

/// A model-proposed invocation (§3 "Function calls carry `{id?, name,
/// arguments: map}`").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

/// A tool schema handed to the model (name/description/parameters only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One part of a candidate's content: text or one-or-more function calls
/// (§4.6: "A Part is either text or a list of function calls").
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCalls(Vec<FunctionCall>),
}

/// A single streamed event from `Chat.send_streaming` (§4.6).
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A complete Part from the first candidate of one yielded Response.
    Part(Part),
    /// The stream finished normally.
    Done,
    /// A recoverable error surfaced mid-stream.
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_user_sets_role_and_text() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.as_text(), Some("hello"));
    }

    #[test]
    fn message_tool_result_round_trips_via_as_text_none() {
        let m = Message::tool_result("id-1", "output");
        assert_eq!(m.role, Role::Tool);
        assert!(m.as_text().is_none());
    }

    #[test]
    fn function_call_arguments_is_structured_map() {
        let call = FunctionCall { id: Some("1".into()), name: "kubectl".into(), arguments: json!({"command": "kubectl get pods"}) };
        let encoded = serde_json::to_string(&call).unwrap();
        let back: FunctionCall = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back.arguments["command"], "kubectl get pods");
    }

    #[test]
    fn tool_schema_serializes() {
        let schema = ToolSchema { name: "kubectl".into(), description: "runs kubectl".into(), parameters: json!({"type": "object"}) };
        let encoded = serde_json::to_string(&schema).unwrap();
        assert!(encoded.contains("kubectl"));
    }
}
