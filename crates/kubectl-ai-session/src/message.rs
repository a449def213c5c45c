// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who originated a [`Message`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    User,
    Agent,
    Model,
}

/// Type-specific content of a [`Message`] (§3). The tag doubles as the
/// spec's `Type` field; invariant checking of (Source, Type) combinations
/// happens in [`Message::new`], not in this enum's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Payload {
    Text { text: String, streaming: bool },
    Error { message: String },
    ToolCallRequest {
        call_id: String,
        tool_name: String,
        description: String,
    },
    ToolCallResponse {
        call_id: String,
        tool_name: String,
        result: serde_json::Value,
        is_error: bool,
    },
    UserInputRequest { prompt: String },
    UserInputResponse { query: String },
    UserChoiceRequest {
        prompt: String,
        options: Vec<String>,
    },
    UserChoiceResponse { choice: u8 },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text { .. } => "text",
            Payload::Error { .. } => "error",
            Payload::ToolCallRequest { .. } => "tool-call-request",
            Payload::ToolCallResponse { .. } => "tool-call-response",
            Payload::UserInputRequest { .. } => "user-input-request",
            Payload::UserInputResponse { .. } => "user-input-response",
            Payload::UserChoiceRequest { .. } => "user-choice-request",
            Payload::UserChoiceResponse { .. } => "user-choice-response",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid (source, type) combination: source={source:?} type={kind}")]
pub struct InvalidCombination {
    pub source: Source,
    pub kind: &'static str,
}

/// A single entry in the conversation history (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub source: Source,
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Construct a message, rejecting (Source, Type) combinations the spec
    /// forbids — e.g. a `user-choice-request` may only originate from the
    /// agent.
    pub fn new(source: Source, payload: Payload) -> Result<Self, InvalidCombination> {
        validate_combination(source, &payload)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            source,
            payload,
            timestamp: Utc::now(),
        })
    }
}

fn validate_combination(source: Source, payload: &Payload) -> Result<(), InvalidCombination> {
    use Payload::*;
    let ok = match payload {
        Text { .. } => matches!(source, Source::User | Source::Agent | Source::Model),
        Error { .. } => matches!(source, Source::Agent),
        ToolCallRequest { .. } => matches!(source, Source::Agent),
        ToolCallResponse { .. } => matches!(source, Source::Agent),
        UserInputRequest { .. } => matches!(source, Source::Agent),
        UserInputResponse { .. } => matches!(source, Source::User),
        UserChoiceRequest { .. } => matches!(source, Source::Agent),
        UserChoiceResponse { .. } => matches!(source, Source::User),
    };
    if ok {
        Ok(())
    } else {
        Err(InvalidCombination {
            source,
            kind: payload.kind(),
        })
    }
}
