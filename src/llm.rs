// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! A generic OpenAI-compatible `ModelClient` — the one concrete wire
//! protocol the engine crates deliberately do not carry (kubectl-ai-model
//! defines only the `ModelClient`/`Chat` boundary; see its crate docs).
//! Trimmed down from a much larger driver: one chat endpoint, one auth
//! style, SSE streaming, nothing provider-specific beyond the handful of
//! header/body quirks OpenAI-compatible gateways actually vary on.

use std::pin::Pin;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};

use kubectl_ai_model::{
    Chat, FunctionCall, Message, MessageContent, ModelClient, Role, ToolSchema,
};

/// How the API key is attached to outgoing requests.
#[derive(Debug, Clone, Copy)]
pub enum AuthStyle {
    Bearer,
    ApiKeyHeader,
    None,
}

/// Configuration for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub provider_name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub auth_style: AuthStyle,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl OpenAiCompatConfig {
    /// Resolve from `llm-provider` plus the matching `<PROVIDER>_API_KEY`
    /// environment variable, falling back to the OpenAI public endpoint.
    pub fn from_env(provider: Option<&str>) -> Self {
        let provider_name = provider.unwrap_or("openai").to_string();
        let env_prefix = provider_name.to_ascii_uppercase().replace('-', "_");
        let api_key = std::env::var(format!("{env_prefix}_API_KEY")).ok();
        let base_url = std::env::var(format!("{env_prefix}_BASE_URL"))
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        Self {
            provider_name,
            base_url,
            api_key,
            auth_style: AuthStyle::Bearer,
            max_tokens: 4096,
            temperature: 0.2,
        }
    }
}

pub struct OpenAiCompatClient {
    config: OpenAiCompatConfig,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiCompatConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    async fn start_chat(&self, system_prompt: &str, model_id: &str) -> anyhow::Result<Box<dyn Chat>> {
        Ok(Box::new(OpenAiCompatChat {
            client: self.client.clone(),
            config: self.config.clone(),
            model_id: model_id.to_string(),
            history: vec![Message { role: Role::System, content: MessageContent::Text(system_prompt.to_string()) }],
            tools: Vec::new(),
        }))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        let Some(key) = &self.config.api_key else {
            return Ok(Vec::new());
        };
        let url = format!("{}/models", self.config.base_url);
        let req = match self.config.auth_style {
            AuthStyle::Bearer => self.client.get(&url).bearer_auth(key),
            AuthStyle::ApiKeyHeader => self.client.get(&url).header("api-key", key),
            AuthStyle::None => self.client.get(&url),
        };
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Ok(Vec::new());
        }
        let body: Value = resp.json().await?;
        let ids = body["data"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct OpenAiCompatChat {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
    model_id: String,
    history: Vec<Message>,
    tools: Vec<ToolSchema>,
}

#[async_trait]
impl Chat for OpenAiCompatChat {
    fn set_function_definitions(&mut self, defs: Vec<ToolSchema>) {
        self.tools = defs;
    }

    async fn send_streaming(&mut self, parts: Vec<Message>) -> anyhow::Result<kubectl_ai_model::ResponseStream> {
        self.history.extend(parts);

        let messages = build_openai_messages(&self.history);
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model_id,
            "messages": messages,
            "stream": true,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        let url = format!("{}/chat/completions", self.config.base_url);
        let mut http_req = self.client.post(&url).json(&body);
        http_req = match self.config.auth_style {
            AuthStyle::Bearer => {
                let key = self
                    .config
                    .api_key
                    .as_deref()
                    .context("no API key configured for this provider")?;
                http_req.bearer_auth(key)
            }
            AuthStyle::ApiKeyHeader => {
                let key = self
                    .config
                    .api_key
                    .as_deref()
                    .context("no API key configured for this provider")?;
                http_req.header("api-key", key)
            }
            AuthStyle::None => http_req,
        };

        let resp = http_req
            .send()
            .await
            .with_context(|| format!("{} request failed", self.config.provider_name))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("{} error {status}: {text}", self.config.provider_name);
        }

        let byte_stream = resp.bytes_stream();
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let events: Vec<anyhow::Result<kubectl_ai_model::ResponseEvent>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(anyhow::anyhow!(e))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        let stream: Pin<Box<dyn Stream<Item = anyhow::Result<kubectl_ai_model::ResponseEvent>> + Send>> =
            Box::pin(event_stream);
        Ok(stream)
    }
}

/// Parse one complete SSE `data:` line. `None` for blank/comment lines.
fn parse_sse_data_line(line: &str) -> Option<anyhow::Result<kubectl_ai_model::ResponseEvent>> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(kubectl_ai_model::ResponseEvent::Done));
    }
    let v: Value = serde_json::from_str(data).ok()?;
    Some(parse_sse_chunk(&v))
}

/// Drain every complete `\n`-terminated line from `buf`, leaving a trailing
/// incomplete line (if any) for the next chunk — SSE events can be split
/// across TCP packets.
fn drain_complete_sse_lines(buf: &mut String) -> Vec<anyhow::Result<kubectl_ai_model::ResponseEvent>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(ev);
        }
    }
    events
}

fn parse_sse_chunk(v: &Value) -> anyhow::Result<kubectl_ai_model::ResponseEvent> {
    let choice = &v["choices"][0];
    let delta = &choice["delta"];

    if let Some(tool_calls) = delta.get("tool_calls") {
        if let Some(tc) = tool_calls.get(0) {
            let id = tc["id"].as_str().map(str::to_string);
            let name = tc["function"]["name"].as_str().unwrap_or("").to_string();
            let arguments_text = tc["function"]["arguments"].as_str().unwrap_or("{}");
            let arguments: Value = serde_json::from_str(arguments_text).unwrap_or(json!({}));
            return Ok(kubectl_ai_model::ResponseEvent::Part(kubectl_ai_model::Part::FunctionCalls(vec![
                FunctionCall { id, name, arguments },
            ])));
        }
    }

    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            return Ok(kubectl_ai_model::ResponseEvent::Part(kubectl_ai_model::Part::Text(text.to_string())));
        }
    }

    Ok(kubectl_ai_model::ResponseEvent::Part(kubectl_ai_model::Part::Text(String::new())))
}

/// Convert history into the OpenAI wire-format JSON array.
fn build_openai_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| match &m.content {
            MessageContent::Text(t) => json!({ "role": role_str(&m.role), "content": t }),
            MessageContent::ToolCall { tool_call_id, function } => json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": tool_call_id,
                    "type": "function",
                    "function": { "name": function.name, "arguments": function.arguments.to_string() },
                }],
            }),
            MessageContent::ToolResult { tool_call_id, content } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content.as_str(),
            }),
        })
        .collect()
}

fn role_str(r: &Role) -> &'static str {
    match r {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

pub fn client_for(config: OpenAiCompatConfig) -> anyhow::Result<Arc<dyn ModelClient>> {
    Ok(Arc::new(OpenAiCompatClient::new(config)?))
}
