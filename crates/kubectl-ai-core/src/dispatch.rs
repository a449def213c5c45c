// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Tool-call batch analysis and dispatch (§4.8 "Dispatch of a tool-call
//! batch"): binding the model's proposed function calls to registered tools,
//! and encoding executed results back into `currentChatContent` per
//! native/shim mode.

use serde_json::json;

use kubectl_ai_model::{FunctionCall, Message as ModelMessage};
use kubectl_ai_session::Payload;
use kubectl_ai_tools::{analyze, ToolCall, ToolCallAnalysis, ToolOutput, ToolRegistry};

use crate::engine::Engine;

/// A proposed call the registry could not bind — unknown tool name or
/// arguments failing schema validation. Never executed or gated; always fed
/// back immediately as a ValidationError observation (§7).
pub(crate) struct InvalidCall {
    pub id: String,
    pub name: String,
    pub message: String,
}

/// Split the model's proposed function calls into calls bound to a
/// registered [`ToolDefinition`] (and classified) and calls that failed
/// registry validation (§4.8 step 6, §7 ValidationError).
pub(crate) fn analyze_calls(
    tools: &ToolRegistry,
    calls: Vec<FunctionCall>,
) -> (Vec<ToolCallAnalysis>, Vec<InvalidCall>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for fc in calls {
        let id = fc.id.clone().unwrap_or_default();
        match tools.parse_invocation(&fc.name, fc.arguments.clone()) {
            Ok(mut call) => {
                call.id = id;
                let def = tools
                    .lookup(&fc.name)
                    .expect("parse_invocation already validated the tool name");
                valid.push(analyze(call, def.as_ref()));
            }
            Err(e) => invalid.push(InvalidCall { id, name: fc.name, message: e.to_string() }),
        }
    }
    (valid, invalid)
}

/// Pretty-print a call's name and arguments for `tool-call-request`
/// descriptions and permission-gate prompts (§4.8).
pub(crate) fn describe_call(call: &ToolCall) -> String {
    format!("{}({})", call.name, call.args)
}

/// The reason fed back to the model for one call in a batch rejected
/// because *some* call in it was interactive (§4.8 "Interactive isolation").
/// A call that is itself interactive gets its own explanation; a
/// non-interactive sibling gets a reason naming why it, too, was skipped,
/// rather than the interactive call's explanation misapplied to it.
pub(crate) fn interactive_batch_reason(analysis: &ToolCallAnalysis) -> String {
    if analysis.is_interactive {
        analysis
            .interactive_explanation
            .clone()
            .unwrap_or_else(|| format!("{} requires an interactive terminal", analysis.call.name))
    } else {
        "skipped: another call in this batch requires an interactive terminal".to_string()
    }
}

/// Build the `currentChatContent` observation for one executed call's
/// result, per mode (§4.8 step 4).
fn encode_result(shim_mode: bool, name: &str, call_id: &str, output: &ToolOutput) -> ModelMessage {
    if shim_mode {
        ModelMessage::user(format!("Result of running \"{name}\":\n{}", output.content))
    } else {
        let body = json!({ "name": name, "result": output.content, "is_error": output.is_error });
        ModelMessage::tool_result(call_id, body.to_string())
    }
}

/// Build the synthesized failure observation fed back for a call that was
/// never executed — interactive, invalid, or declined (§4.8, §7
/// PolicyError/ValidationError).
pub(crate) fn encode_failure(shim_mode: bool, name: &str, call_id: &str, reason: &str) -> ModelMessage {
    if shim_mode {
        ModelMessage::user(format!("Result of running \"{name}\":\n{{\"error\": \"{reason}\"}}"))
    } else {
        let body = json!({ "name": name, "error": reason });
        ModelMessage::tool_result(call_id, body.to_string())
    }
}

impl Engine {
    /// Run one approved batch sequentially in arrival order (§4.8 "Dispatch
    /// of a tool-call batch"; §5 "tool-call-response messages appear in the
    /// same order as tool-call-request messages").
    pub(crate) async fn dispatch_batch(&mut self, batch: Vec<ToolCallAnalysis>) {
        for analysis in batch {
            let call = analysis.call;
            let name = call.name.clone();
            let id = call.id.clone();

            let Some(def) = self.tools.lookup(&name) else {
                // Registered at analysis time; the registry only grows after
                // startup (§9 "Registry mutability"), so this only fires if
                // a tool vanished mid-run. Treat defensively as a failure.
                let failure = encode_failure(self.shim_mode, &name, &id, "tool no longer registered");
                self.current_chat_content.push(failure);
                continue;
            };

            let description = describe_call(&call);
            self.emit_agent(Payload::ToolCallRequest {
                call_id: id.clone(),
                tool_name: name.clone(),
                description,
            })
            .await;

            let ctx = kubectl_ai_tools::ExecContext {
                kubeconfig: Some(self.options.kubeconfig.clone()),
                work_dir: self.work_dir.clone(),
            };
            let output = def.execute(&call, &ctx).await;

            if output.is_timeout {
                self.emit_agent(Payload::Text {
                    text: format!("\"{name}\" exceeded the default 7-second subprocess timeout."),
                    streaming: false,
                })
                .await;
            }

            self.current_chat_content.push(encode_result(self.shim_mode, &name, &id, &output));

            self.emit_agent(Payload::ToolCallResponse {
                call_id: id,
                tool_name: name,
                result: json!({ "content": output.content, "is_error": output.is_error }),
                is_error: output.is_error,
            })
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(is_interactive: bool, explanation: Option<&str>) -> ToolCallAnalysis {
        ToolCallAnalysis {
            call: ToolCall { id: "1".into(), name: "bash".into(), args: json!({}) },
            is_interactive,
            interactive_explanation: explanation.map(str::to_string),
            modifies_resource: kubectl_ai_tools::ModifiesResource::Unknown,
        }
    }

    #[test]
    fn interactive_call_keeps_its_own_explanation() {
        let a = analysis(true, Some("kubectl edit requires an interactive terminal"));
        assert_eq!(interactive_batch_reason(&a), "kubectl edit requires an interactive terminal");
    }

    #[test]
    fn interactive_call_without_explanation_falls_back_to_a_generic_reason() {
        let a = analysis(true, None);
        assert_eq!(interactive_batch_reason(&a), "bash requires an interactive terminal");
    }

    #[test]
    fn non_interactive_sibling_gets_a_batch_skip_reason_not_the_interactive_explanation() {
        let a = analysis(false, None);
        let reason = interactive_batch_reason(&a);
        assert_eq!(reason, "skipped: another call in this batch requires an interactive terminal");
        assert_ne!(reason, "bash requires an interactive terminal");
    }
}
