// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Adapts one remote tool descriptor into a [`ToolDefinition`] so it can be
//! registered into the same [`kubectl_ai_tools::ToolRegistry`] the built-in
//! tools live in (§4.5, "discovered tools are registered into the same
//! registry as built-ins, namespaced by `<server>.<tool>`").

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use kubectl_ai_tools::{ExecContext, ModifiesResource, ToolCall, ToolDefinition, ToolOutput};

use crate::coerce::coerce_arguments;
use crate::protocol::RemoteToolDescriptor;
use crate::transport::Transport;

/// A tool whose execution is delegated over a [`Transport`] to an external
/// server. Remote tools are always classified [`ModifiesResource::Unknown`]
/// unless the model supplies an explicit override (§4.5: "the broker itself
/// has no notion of which remote operations mutate cluster state") and are
/// never interactive (§4.5: "remote tools cannot request a TTY").
pub struct RemoteTool {
    qualified_name: String,
    descriptor: RemoteToolDescriptor,
    transport: Arc<dyn Transport>,
    /// Per-server timeout (§6.4 `timeout`, default 30s) bounding one
    /// `tools/call` round-trip so a hung remote tool server cannot block the
    /// engine turn indefinitely (§5, "a root cancellable scope is threaded
    /// through every operation").
    timeout: Duration,
}

impl RemoteTool {
    pub fn new(
        server_name: &str,
        descriptor: RemoteToolDescriptor,
        transport: Arc<dyn Transport>,
        timeout: Duration,
    ) -> Self {
        let qualified_name = format!("{server_name}.{}", descriptor.name);
        Self { qualified_name, descriptor, transport, timeout }
    }
}

#[async_trait]
impl ToolDefinition for RemoteTool {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn input_schema(&self) -> Value {
        self.descriptor.input_schema.clone()
    }

    fn is_interactive(&self, _args: &Value) -> Result<bool, String> {
        Ok(false)
    }

    fn modifies_resource(&self, args: &Value) -> ModifiesResource {
        kubectl_ai_tools::explicit_modifies_resource(args).unwrap_or(ModifiesResource::Unknown)
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ExecContext) -> ToolOutput {
        let coerced = coerce_arguments(&call.args);
        let params = serde_json::json!({
            "name": self.descriptor.name,
            "arguments": coerced,
        });
        match tokio::time::timeout(self.timeout, self.transport.call("tools/call", params)).await {
            Ok(Ok(value)) => match serde_json::from_value::<crate::protocol::ToolCallResult>(value) {
                Ok(result) => {
                    let text = result.first_text().unwrap_or("").to_string();
                    if result.is_error {
                        ToolOutput::err(&call.id, failure_content(text))
                    } else {
                        ToolOutput::ok(&call.id, text)
                    }
                }
                Err(e) => ToolOutput::err(&call.id, failure_content(format!("malformed tool result: {e}"))),
            },
            Ok(Err(e)) => ToolOutput::err(&call.id, failure_content(e.to_string())),
            Err(_) => ToolOutput::err(
                &call.id,
                failure_content(format!("tool call timed out after {:?}", self.timeout)),
            ),
        }
    }
}

/// Builds the `{error:true, message, status:"failed"}` JSON object a failed
/// remote tool call is reported back to the model as (§4.5), serialized so
/// it can stand in for the normal string `content` of a tool result.
fn failure_content(message: impl Into<String>) -> String {
    serde_json::json!({
        "error": true,
        "message": message.into(),
        "status": "failed",
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedTransport {
        response: Mutex<Option<Result<Value, TransportError>>>,
        last_params: Mutex<Option<Value>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn call(&self, _method: &str, params: Value) -> Result<Value, TransportError> {
            *self.last_params.lock().unwrap() = Some(params);
            self.response.lock().unwrap().take().expect("scripted once")
        }
    }

    fn descriptor() -> RemoteToolDescriptor {
        RemoteToolDescriptor {
            name: "list_pods".into(),
            description: "lists pods".into(),
            input_schema: json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn name_is_namespaced_by_server() {
        let transport = Arc::new(ScriptedTransport {
            response: Mutex::new(Some(Ok(json!({"content":[],"isError":false})))),
            last_params: Mutex::new(None),
        });
        let tool = RemoteTool::new("cluster-a", descriptor(), transport, Duration::from_secs(30));
        assert_eq!(tool.name(), "cluster-a.list_pods");
    }

    #[tokio::test]
    async fn execute_returns_first_text_content_on_success() {
        let transport = Arc::new(ScriptedTransport {
            response: Mutex::new(Some(Ok(
                json!({"content":[{"type":"text","text":"3 pods"}],"isError":false}),
            ))),
            last_params: Mutex::new(None),
        });
        let tool = RemoteTool::new("cluster-a", descriptor(), transport, Duration::from_secs(30));
        let call = ToolCall { id: "1".into(), name: tool.name().to_string(), args: json!({"max_count": "5"}) };
        let out = tool.execute(&call, &ExecContext::default()).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "3 pods");
    }

    #[tokio::test]
    async fn execute_marks_is_error_from_result() {
        let transport = Arc::new(ScriptedTransport {
            response: Mutex::new(Some(Ok(
                json!({"content":[{"type":"text","text":"boom"}],"isError":true}),
            ))),
            last_params: Mutex::new(None),
        });
        let tool = RemoteTool::new("cluster-a", descriptor(), transport, Duration::from_secs(30));
        let call = ToolCall { id: "1".into(), name: tool.name().to_string(), args: json!({}) };
        let out = tool.execute(&call, &ExecContext::default()).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn execute_surfaces_transport_error() {
        let transport = Arc::new(ScriptedTransport {
            response: Mutex::new(Some(Err(TransportError::Io("broken pipe".into())))),
            last_params: Mutex::new(None),
        });
        let tool = RemoteTool::new("cluster-a", descriptor(), transport, Duration::from_secs(30));
        let call = ToolCall { id: "1".into(), name: tool.name().to_string(), args: json!({}) };
        let out = tool.execute(&call, &ExecContext::default()).await;
        assert!(out.is_error);
        let body: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(body["error"], json!(true));
        assert_eq!(body["status"], json!("failed"));
        assert!(body["message"].as_str().unwrap().contains("broken pipe"));
    }

    #[tokio::test]
    async fn execute_wraps_malformed_result_as_failure_object() {
        let transport = Arc::new(ScriptedTransport {
            response: Mutex::new(Some(Ok(json!({"content": "not an array", "isError": false})))),
            last_params: Mutex::new(None),
        });
        let tool = RemoteTool::new("cluster-a", descriptor(), transport, Duration::from_secs(30));
        let call = ToolCall { id: "1".into(), name: tool.name().to_string(), args: json!({}) };
        let out = tool.execute(&call, &ExecContext::default()).await;
        assert!(out.is_error);
        let body: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(body["error"], json!(true));
        assert_eq!(body["status"], json!("failed"));
    }

    #[tokio::test]
    async fn execute_coerces_arguments_before_sending() {
        let transport = Arc::new(ScriptedTransport {
            response: Mutex::new(Some(Ok(json!({"content":[],"isError":false})))),
            last_params: Mutex::new(None),
        });
        let tool = RemoteTool::new("cluster-a", descriptor(), transport.clone(), Duration::from_secs(30));
        let call = ToolCall {
            id: "1".into(),
            name: tool.name().to_string(),
            args: json!({"max_count": "5"}),
        };
        tool.execute(&call, &ExecContext::default()).await;
        let sent = transport.last_params.lock().unwrap().clone().unwrap();
        assert_eq!(sent["arguments"]["maxCount"], json!(5));
    }

    struct HangingTransport;

    #[async_trait]
    impl Transport for HangingTransport {
        async fn call(&self, _method: &str, _params: Value) -> Result<Value, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("timeout must fire first")
        }
    }

    #[tokio::test]
    async fn execute_times_out_instead_of_hanging_forever() {
        let tool = RemoteTool::new("cluster-a", descriptor(), Arc::new(HangingTransport), Duration::from_millis(20));
        let call = ToolCall { id: "1".into(), name: tool.name().to_string(), args: json!({}) };
        let out = tool.execute(&call, &ExecContext::default()).await;
        assert!(out.is_error);
        let body: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(body["error"], json!(true));
        assert!(body["message"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn unknown_modifies_resource_without_explicit_override() {
        let transport = Arc::new(ScriptedTransport {
            response: Mutex::new(None),
            last_params: Mutex::new(None),
        });
        let tool = RemoteTool::new("cluster-a", descriptor(), transport, Duration::from_secs(30));
        assert_eq!(tool.modifies_resource(&json!({})), ModifiesResource::Unknown);
        assert_eq!(
            tool.modifies_resource(&json!({"modifies_resource":"yes"})),
            ModifiesResource::Yes
        );
    }
}
