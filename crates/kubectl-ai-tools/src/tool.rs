// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// `modifies_resource` classification (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifiesResource {
    Yes,
    No,
    Unknown,
}

/// A single tool invocation requested by the model, already bound to a
/// registered [`ToolDefinition`] (§3, "ToolCall").
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim).
    pub id: String,
    pub name: String,
    /// Original argument map, preserved for round-tripping back to the model.
    pub args: Value,
}

/// Ambient execution context threaded into every tool invocation (§4.8
/// dispatch step 2: "passing `{Kubeconfig, WorkDir}`").
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    pub kubeconfig: Option<PathBuf>,
    pub work_dir: PathBuf,
}

/// Result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
    /// Set only for the subprocess-timeout classification (§4.4). Carried
    /// as a distinct field rather than re-derived from `content` wording, so
    /// dispatch's "exceeded the default timeout" notice (§4.8) doesn't rely
    /// on matching a substring that happens to appear in the message today.
    pub is_timeout: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error: false, is_timeout: false }
    }

    pub fn err(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error: true, is_timeout: false }
    }

    pub fn timeout(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error: true, is_timeout: true }
    }
}

/// A registered callable tool (§3 ToolDefinition). Name is unique within a
/// registry; `is_interactive`/`modifies_resource` are the safety-gate
/// metadata bits the engine consults before dispatch (§4.8).
#[async_trait]
pub trait ToolDefinition: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Object schema with typed properties and a required set.
    fn input_schema(&self) -> Value;

    /// Returns an explanatory failure when the tool requires a human at a
    /// TTY for these arguments (e.g. `kubectl edit`, `vim`, paging, `less`).
    fn is_interactive(&self, args: &Value) -> Result<bool, String>;

    /// `no` for known read-only verbs, `yes` for known mutators, `unknown`
    /// otherwise — falling back to an explicit argument supplied by the
    /// model when the tool itself cannot decide (§4.3, §4.8).
    fn modifies_resource(&self, args: &Value) -> ModifiesResource;

    async fn execute(&self, call: &ToolCall, ctx: &ExecContext) -> ToolOutput;
}

/// Read an explicit `modifies_resource` argument (`"yes"|"no"|"unknown"`)
/// supplied by the model, if present. Shared by every built-in tool that
/// accepts the argument per §4.3.
pub fn explicit_modifies_resource(args: &Value) -> Option<ModifiesResource> {
    match args.get("modifies_resource").and_then(Value::as_str) {
        Some("yes") => Some(ModifiesResource::Yes),
        Some("no") => Some(ModifiesResource::No),
        Some("unknown") => Some(ModifiesResource::Unknown),
        _ => None,
    }
}

/// For a proposed invocation: the parsed tool-call handle, `is_interactive`
/// flag plus any explanation error, and a `modifies_resource` classification
/// (§3 ToolCallAnalysis).
#[derive(Debug, Clone)]
pub struct ToolCallAnalysis {
    pub call: ToolCall,
    pub is_interactive: bool,
    pub interactive_explanation: Option<String>,
    pub modifies_resource: ModifiesResource,
}

/// Classify a bound call against its definition (§4.8 step 6: "analyze all
/// proposed function calls into `ToolCallAnalysis[]`").
pub fn analyze(call: ToolCall, def: &dyn ToolDefinition) -> ToolCallAnalysis {
    let (is_interactive, interactive_explanation) = match def.is_interactive(&call.args) {
        Ok(false) => (false, None),
        Ok(true) => (true, Some(format!("{} requires an interactive terminal", def.name()))),
        Err(explanation) => (true, Some(explanation)),
    };
    let modifies_resource = def.modifies_resource(&call.args);
    ToolCallAnalysis { call, is_interactive, interactive_explanation, modifies_resource }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct DummyTool;

    #[async_trait]
    impl ToolDefinition for DummyTool {
        fn name(&self) -> &str { "dummy" }
        fn description(&self) -> &str { "a dummy tool" }
        fn input_schema(&self) -> Value { json!({"type": "object"}) }
        fn is_interactive(&self, _args: &Value) -> Result<bool, String> { Ok(false) }
        fn modifies_resource(&self, args: &Value) -> ModifiesResource {
            explicit_modifies_resource(args).unwrap_or(ModifiesResource::Unknown)
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ExecContext) -> ToolOutput {
            ToolOutput::ok(&call.id, "ok")
        }
    }

    #[test]
    fn timeout_output_is_distinguishable_from_a_plain_error() {
        let timeout = ToolOutput::timeout("1", "command timed out after 7s");
        assert!(timeout.is_error);
        assert!(timeout.is_timeout);

        let plain_error = ToolOutput::err("1", "some unrelated failure that happens to mention timed out");
        assert!(plain_error.is_error);
        assert!(!plain_error.is_timeout);
    }

    #[test]
    fn explicit_modifies_resource_parses_all_variants() {
        assert_eq!(explicit_modifies_resource(&json!({"modifies_resource":"yes"})), Some(ModifiesResource::Yes));
        assert_eq!(explicit_modifies_resource(&json!({"modifies_resource":"no"})), Some(ModifiesResource::No));
        assert_eq!(explicit_modifies_resource(&json!({"modifies_resource":"unknown"})), Some(ModifiesResource::Unknown));
        assert_eq!(explicit_modifies_resource(&json!({})), None);
    }

    #[test]
    fn analyze_falls_back_to_unknown_without_explicit_arg() {
        let call = ToolCall { id: "1".into(), name: "dummy".into(), args: json!({}) };
        let analysis = analyze(call, &DummyTool);
        assert_eq!(analysis.modifies_resource, ModifiesResource::Unknown);
        assert!(!analysis.is_interactive);
    }

    #[test]
    fn analyze_surfaces_interactive_explanation() {
        struct InteractiveTool;
        #[async_trait]
        impl ToolDefinition for InteractiveTool {
            fn name(&self) -> &str { "interactive" }
            fn description(&self) -> &str { "" }
            fn input_schema(&self) -> Value { json!({}) }
            fn is_interactive(&self, _args: &Value) -> Result<bool, String> {
                Err("requires a tty".to_string())
            }
            fn modifies_resource(&self, _args: &Value) -> ModifiesResource { ModifiesResource::Unknown }
            async fn execute(&self, call: &ToolCall, _ctx: &ExecContext) -> ToolOutput {
                ToolOutput::ok(&call.id, "")
            }
        }
        let call = ToolCall { id: "1".into(), name: "interactive".into(), args: json!({}) };
        let analysis = analyze(call, &InteractiveTool);
        assert!(analysis.is_interactive);
        assert_eq!(analysis.interactive_explanation.as_deref(), Some("requires a tty"));
    }
}
