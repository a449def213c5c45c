// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Deterministic mock `ModelClient`/`Chat` pair for engine tests (S1-S6):
//! each call to `send_streaming` pops the next scripted response sequence
//! from the front of a queue.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use crate::provider::{Chat, ModelClient, ResponseStream};
use crate::types::{FunctionCall, Message, Part, ResponseEvent, ToolSchema};

/// A scripted round: the ordered [`ResponseEvent`]s yielded for one
/// `send_streaming` call.
pub type Script = Vec<ResponseEvent>;

/// Builds [`Script`]s that produce a single text Part.
pub fn text_script(text: impl Into<String>) -> Script {
    vec![ResponseEvent::Part(Part::Text(text.into())), ResponseEvent::Done]
}

/// Builds a [`Script`] that proposes one function call.
pub fn tool_call_script(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Script {
    vec![
        ResponseEvent::Part(Part::FunctionCalls(vec![FunctionCall {
            id: Some(id.into()),
            name: name.into(),
            arguments,
        }])),
        ResponseEvent::Done,
    ]
}

pub struct ScriptedChat {
    scripts: Arc<Mutex<Vec<Script>>>,
    pub sent: Arc<Mutex<Vec<Vec<Message>>>>,
    pub function_definitions: Vec<ToolSchema>,
}

#[async_trait]
impl Chat for ScriptedChat {
    fn set_function_definitions(&mut self, defs: Vec<ToolSchema>) {
        self.function_definitions = defs;
    }

    async fn send_streaming(&mut self, parts: Vec<Message>) -> anyhow::Result<ResponseStream> {
        self.sent.lock().unwrap().push(parts);
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                vec![ResponseEvent::Part(Part::Text("[no more scripts]".into())), ResponseEvent::Done]
            } else {
                scripts.remove(0)
            }
        };
        let wrapped: Vec<anyhow::Result<ResponseEvent>> = script.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }
}

/// A `ModelClient` that hands out one [`ScriptedChat`] per `start_chat`,
/// all sharing the same script queue.
pub struct ScriptedMockClient {
    scripts: Arc<Mutex<Vec<Script>>>,
    name: String,
}

impl ScriptedMockClient {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self { scripts: Arc::new(Mutex::new(scripts)), name: "scripted-mock".into() }
    }

    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![text_script(reply)])
    }

    /// Round 1: a single tool call. Round 2: a closing text reply.
    pub fn tool_then_text(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![tool_call_script(call_id, tool_name, arguments), text_script(final_text)])
    }
}

#[async_trait]
impl ModelClient for ScriptedMockClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_chat(&self, _system_prompt: &str, _model_id: &str) -> anyhow::Result<Box<dyn Chat>> {
        Ok(Box::new(ScriptedChat {
            scripts: self.scripts.clone(),
            sent: Arc::new(Mutex::new(Vec::new())),
            function_definitions: Vec::new(),
        }))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        Ok(vec!["scripted-mock-model".to_string()])
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn always_text_yields_single_reply() {
        let client = ScriptedMockClient::always_text("hello world");
        let mut chat = client.start_chat("system", "model").await.unwrap();
        let mut stream = chat.send_streaming(vec![Message::user("hi")]).await.unwrap();
        let ev = stream.next().await.unwrap().unwrap();
        assert!(matches!(ev, ResponseEvent::Part(Part::Text(t)) if t == "hello world"));
    }

    #[tokio::test]
    async fn tool_then_text_two_rounds() {
        let client = ScriptedMockClient::tool_then_text(
            "call-1",
            "kubectl",
            serde_json::json!({"command": "kubectl get pods"}),
            "done",
        );
        let mut chat = client.start_chat("system", "model").await.unwrap();

        let mut events = Vec::new();
        let mut stream = chat.send_streaming(vec![Message::user("what pods are running?")]).await.unwrap();
        while let Some(ev) = stream.next().await {
            events.push(ev.unwrap());
        }
        assert!(events.iter().any(|e| matches!(e, ResponseEvent::Part(Part::FunctionCalls(calls)) if calls[0].name == "kubectl")));

        let mut events2 = Vec::new();
        let mut stream2 = chat.send_streaming(vec![Message::tool_result("call-1", "pod-a 1/1")]).await.unwrap();
        while let Some(ev) = stream2.next().await {
            events2.push(ev.unwrap());
        }
        assert!(events2.iter().any(|e| matches!(e, ResponseEvent::Part(Part::Text(t)) if t == "done")));
    }

    #[tokio::test]
    async fn exhausted_scripts_fall_back() {
        let client = ScriptedMockClient::new(vec![]);
        let mut chat = client.start_chat("system", "model").await.unwrap();
        let mut stream = chat.send_streaming(vec![]).await.unwrap();
        let ev = stream.next().await.unwrap().unwrap();
        assert!(matches!(ev, ResponseEvent::Part(Part::Text(t)) if t.contains("no more scripts")));
    }

    #[tokio::test]
    async fn records_sent_messages() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut chat = ScriptedChat {
            scripts: Arc::new(Mutex::new(vec![text_script("ok")])),
            sent: sent.clone(),
            function_definitions: Vec::new(),
        };
        chat.send_streaming(vec![Message::user("hi")]).await.unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_models_returns_scripted_model() {
        let client = ScriptedMockClient::always_text("ok");
        let models = client.list_models().await.unwrap();
        assert_eq!(models, vec!["scripted-mock-model"]);
    }
}
