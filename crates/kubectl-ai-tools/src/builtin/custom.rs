// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Shell-templated tools loaded at startup from a user-supplied document
//! (§4.3, `ToolRegistry::load_custom`). Each entry renders `command_template`
//! by substituting `{argument_name}` placeholders with the call's arguments,
//! then runs the result through [`kubectl_ai_exec::run`].

use async_trait::async_trait;
use serde_json::Value;

use kubectl_ai_exec::{run, ExecRequest};

use crate::tool::{explicit_modifies_resource, ExecContext, ModifiesResource, ToolCall, ToolDefinition, ToolOutput};
use crate::truncate::head_tail_truncate;

pub(crate) struct CustomToolSpecPublic {
    pub name: String,
    pub description: String,
    pub command_template: String,
    pub parameters: Value,
    pub modifies_resource: Option<ModifiesResource>,
}

pub struct CustomTool {
    spec: CustomToolSpecPublic,
}

impl CustomTool {
    pub(crate) fn new(spec: crate::registry::CustomToolSpec) -> Self {
        let modifies_resource = spec.modifies_resource.as_deref().and_then(|s| match s {
            "yes" => Some(ModifiesResource::Yes),
            "no" => Some(ModifiesResource::No),
            "unknown" => Some(ModifiesResource::Unknown),
            _ => None,
        });
        Self {
            spec: CustomToolSpecPublic {
                name: spec.name,
                description: spec.description,
                command_template: spec.command_template,
                parameters: spec.parameters,
                modifies_resource,
            },
        }
    }

    fn render(&self, args: &Value) -> String {
        let mut rendered = self.spec.command_template.clone();
        if let Some(obj) = args.as_object() {
            for (key, value) in obj {
                let placeholder = format!("{{{key}}}");
                let substitution = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                rendered = rendered.replace(&placeholder, &substitution);
            }
        }
        rendered
    }
}

#[async_trait]
impl ToolDefinition for CustomTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn input_schema(&self) -> Value {
        if self.spec.parameters.is_null() {
            serde_json::json!({"type": "object"})
        } else {
            self.spec.parameters.clone()
        }
    }

    fn is_interactive(&self, _args: &Value) -> Result<bool, String> {
        Ok(false)
    }

    fn modifies_resource(&self, args: &Value) -> ModifiesResource {
        self.spec
            .modifies_resource
            .or_else(|| explicit_modifies_resource(args))
            .unwrap_or(ModifiesResource::Unknown)
    }

    async fn execute(&self, call: &ToolCall, ctx: &ExecContext) -> ToolOutput {
        let command = self.render(&call.args);
        let result = run(ExecRequest {
            command,
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
                ToolOutput::err(&call.id, format!("failed to run {}: {e}", self.spec.name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CustomToolSpec;

    fn spec(template: &str) -> super::CustomTool {
        CustomTool::new(CustomToolSpec {
            name: "greet".into(),
            description: "greets someone".into(),
            command_template: template.into(),
            parameters: serde_json::json!({"type":"object","properties":{"name":{"type":"string"}}}),
            modifies_resource: Some("no".into()),
        })
    }

    #[test]
    fn renders_placeholder() {
        let tool = spec("echo hello {name}");
        let rendered = tool.render(&serde_json::json!({"name": "world"}));
        assert_eq!(rendered, "echo hello world");
    }

    #[test]
    fn uses_spec_default_modifies_resource() {
        let tool = spec("echo hi");
        assert_eq!(tool.modifies_resource(&serde_json::json!({})), ModifiesResource::No);
    }

    #[test]
    fn model_supplied_override_cannot_mask_the_spec_classification() {
        let tool = spec("echo hi");
        let args = serde_json::json!({"modifies_resource": "yes"});
        assert_eq!(tool.modifies_resource(&args), ModifiesResource::No);
    }

    #[test]
    fn explicit_arg_is_used_only_when_spec_has_no_classification() {
        let tool = CustomTool::new(CustomToolSpec {
            name: "greet".into(),
            description: "greets someone".into(),
            command_template: "echo hi".into(),
            parameters: serde_json::json!({"type":"object"}),
            modifies_resource: None,
        });
        let args = serde_json::json!({"modifies_resource": "yes"});
        assert_eq!(tool.modifies_resource(&args), ModifiesResource::Yes);
    }

    #[tokio::test]
    async fn execute_runs_rendered_command() {
        let tool = spec("echo hello {name}");
        let ctx = ExecContext::default();
        let call = ToolCall { id: "1".into(), name: "greet".into(), args: serde_json::json!({"name": "bob"}) };
        let out = tool.execute(&call, &ctx).await;
        assert!(!out.is_error);
        assert!(out.content.contains("hello bob"));
    }
}
