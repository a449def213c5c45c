// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! `kubectl` built-in (§4.3): rejects interactive subcommands and classifies
//! read-only/mutating verbs so the safety gate can reason about them without
//! executing anything.

use async_trait::async_trait;
use serde_json::{json, Value};

use kubectl_ai_exec::{run, ExecRequest};

use crate::tool::{explicit_modifies_resource, ExecContext, ModifiesResource, ToolCall, ToolDefinition, ToolOutput};
use crate::truncate::head_tail_truncate;

/// Subcommands that require an attached TTY and cannot be run headless.
const INTERACTIVE_VERBS: &[&str] = &["edit", "exec", "attach", "run"];

/// Verbs known not to mutate cluster state.
const READ_ONLY_VERBS: &[&str] = &[
    "get", "describe", "logs", "explain", "top", "version", "cluster-info", "api-resources",
    "api-versions", "config",
];

/// Verbs known to mutate cluster state.
const MUTATING_VERBS: &[&str] = &[
    "apply", "delete", "patch", "scale", "create", "replace", "rollout", "drain", "cordon",
    "uncordon", "taint", "label", "annotate", "expose", "autoscale",
];

pub struct KubectlTool;

fn first_verb(command: &str) -> Option<String> {
    command
        .split_whitespace()
        .skip_while(|tok| *tok == "kubectl" || tok.starts_with('-'))
        .next()
        .map(|s| s.to_string())
}

#[async_trait]
impl ToolDefinition for KubectlTool {
    fn name(&self) -> &str {
        "kubectl"
    }

    fn description(&self) -> &str {
        "Run a kubectl command against the configured cluster and return combined stdout/stderr. \
         Non-interactive commands only — `edit`, `exec`, `attach`, and `run` are rejected, as is \
         any argument list containing a lone `-` meaning stdin."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The full kubectl command line, e.g. \"kubectl get pods -n default\""
                },
                "modifies_resource": {
                    "type": "string",
                    "enum": ["yes", "no", "unknown"],
                    "description": "Optional override when the verb isn't recognized"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn is_interactive(&self, args: &Value) -> Result<bool, String> {
        let command = args.get("command").and_then(Value::as_str).unwrap_or("");
        let tokens: Vec<&str> = command.split_whitespace().collect();
        if tokens.iter().any(|t| *t == "-") {
            return Err("kubectl command requires stdin (lone \"-\" argument) and cannot run headless".to_string());
        }
        if let Some(verb) = first_verb(command) {
            if INTERACTIVE_VERBS.contains(&verb.as_str()) {
                return Err(format!("kubectl {verb} requires an interactive terminal"));
            }
        }
        Ok(false)
    }

    fn modifies_resource(&self, args: &Value) -> ModifiesResource {
        let command = args.get("command").and_then(Value::as_str).unwrap_or("");
        match first_verb(command) {
            Some(verb) if READ_ONLY_VERBS.contains(&verb.as_str()) => ModifiesResource::No,
            Some(verb) if MUTATING_VERBS.contains(&verb.as_str()) => ModifiesResource::Yes,
            _ => explicit_modifies_resource(args).unwrap_or(ModifiesResource::Unknown),
        }
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
                ToolOutput::err(&call.id, format!("failed to run kubectl: {e}"))
            }
        }
    }
}
