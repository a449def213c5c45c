// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Generic `bash` built-in (§4.3): runs any shell command, relying entirely
//! on an explicit `modifies_resource` argument from the model since a
//! free-form shell line has no recognizable verb set.

use async_trait::async_trait;
use serde_json::{json, Value};

use kubectl_ai_exec::{run, ExecRequest};

use crate::tool::{explicit_modifies_resource, ExecContext, ModifiesResource, ToolCall, ToolDefinition, ToolOutput};
use crate::truncate::head_tail_truncate;

pub struct BashTool;

#[async_trait]
impl ToolDefinition for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute an arbitrary non-interactive bash command and return combined stdout/stderr. \
         Avoid commands requiring a TTY (paging, editors, interactive prompts)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command line to execute"
                },
                "modifies_resource": {
                    "type": "string",
                    "enum": ["yes", "no", "unknown"],
                    "description": "Whether this command mutates durable state"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn is_interactive(&self, args: &Value) -> Result<bool, String> {
        let command = args.get("command").and_then(Value::as_str).unwrap_or("");
        const INTERACTIVE_TOKENS: &[&str] = &["vim", "vi", "nano", "less", "more", "top", "htop"];
        for token in command.split_whitespace() {
            if INTERACTIVE_TOKENS.contains(&token) {
                return Err(format!("{token} requires an interactive terminal"));
            }
        }
        if command.split_whitespace().any(|t| t == "-") {
            return Err("command requires stdin (lone \"-\" argument) and cannot run headless".to_string());
        }
        Ok(false)
    }

    fn modifies_resource(&self, args: &Value) -> ModifiesResource {
        explicit_modifies_resource(args).unwrap_or(ModifiesResource::Unknown)
    }

    async fn execute(&self, call: &ToolCall, ctx: &ExecContext) -> ToolOutput {
        let Some(command) = call.args.get("command").and_then(Value::as_str) else {
            return ToolOutput::err(&call.id, "missing required argument: command");
        };
        let result = run(ExecRequest {
            command: command.to_string(),
            working_dir: Some(ctx.work_dir.clone()),
            kubeconfig: ctx.kubeconfig.clone(),
            ..Default::default()
        })
        .await;
        let content = head_tail_truncate(&result.output);
        match result.classification {
            kubectl_ai_exec::ExecClassification::Ok => ToolOutput::ok(&call.id, content),
            kubectl_ai_exec::ExecClassification::NonZeroExit(code) => {
                ToolOutput::err(&call.id, format!("[exit {code}]\n{content}"))
            }
            kubectl_ai_exec::ExecClassification::Timeout => {
                ToolOutput::timeout(&call.id, format!("command timed out after {:?}", result.elapsed))
            }
            kubectl_ai_exec::ExecClassification::SpawnError(e) => {
                ToolOutput::err(&call.id, format!("failed to run command: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vim_is_interactive() {
        let args = json!({"command": "vim file.txt"});
        assert!(BashTool.is_interactive(&args).is_err());
    }

    #[test]
    fn plain_command_is_not_interactive() {
        let args = json!({"command": "ls -la"});
        assert_eq!(BashTool.is_interactive(&args), Ok(false));
    }

    #[test]
    fn defaults_to_unknown_without_explicit_arg() {
        let args = json!({"command": "ls -la"});
        assert_eq!(BashTool.modifies_resource(&args), ModifiesResource::Unknown);
    }

    #[test]
    fn respects_explicit_arg() {
        let args = json!({"command": "rm file.txt", "modifies_resource": "yes"});
        assert_eq!(BashTool.modifies_resource(&args), ModifiesResource::Yes);
    }

    #[tokio::test]
    async fn execute_runs_command() {
        let ctx = ExecContext::default();
        let call = ToolCall { id: "1".into(), name: "bash".into(), args: json!({"command": "echo hi"}) };
        let out = BashTool.execute(&call, &ctx).await;
        assert!(!out.is_error);
        assert!(out.content.contains("hi"));
    }
}
