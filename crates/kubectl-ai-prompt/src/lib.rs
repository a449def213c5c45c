// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Prompt Builder (C7): renders the system prompt from a default template,
//! an optional user-supplied override, and one or more extra files appended
//! — with access to the ordered tool manifest and a shim-mode flag (§4.7).
//!
//! Output is a single string prepended to the chat. Errors reading template
//! files are fatal at initialization, per spec.

use std::path::Path;

use kubectl_ai_tools::ToolSchema;

/// The built-in template, used when no `prompt-template-file-path` override
/// is configured (§4.7, §6.1).
const DEFAULT_TEMPLATE: &str = include_str!("templates/default_system_prompt.md");

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read prompt template {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Renders the default (or overridden) template and the ordered tool
/// manifest into one system-prompt string.
pub struct PromptBuilder {
    template_override_path: Option<std::path::PathBuf>,
    extra_paths: Vec<std::path::PathBuf>,
}

impl PromptBuilder {
    pub fn new(
        template_override_path: Option<std::path::PathBuf>,
        extra_paths: Vec<std::path::PathBuf>,
    ) -> Self {
        Self { template_override_path, extra_paths }
    }

    /// Render the final system prompt: the base template (override if
    /// configured, else [`DEFAULT_TEMPLATE`]) with `{{tools}}` and
    /// `{{shim_notice}}` placeholders substituted, followed by the
    /// concatenated contents of every extra prompt path.
    pub fn render(&self, tools: &[ToolSchema], shim_mode: bool) -> Result<String, PromptError> {
        let base = match &self.template_override_path {
            Some(path) => read_file(path)?,
            None => DEFAULT_TEMPLATE.to_string(),
        };

        let tool_manifest = render_tool_manifest(tools);
        let shim_notice = if shim_mode {
            "This model does not support native tool calling. Emit your response as a single \
             fenced ```json block containing {\"thought\": \"...\", \"answer\": \"...\" (optional), \
             \"action\": {\"name\": \"<tool>\", ...} (optional, omit when no tool call is needed)}."
        } else {
            ""
        };

        let mut rendered = base
            .replace("{{tools}}", &tool_manifest)
            .replace("{{shim_notice}}", shim_notice);

        for path in &self.extra_paths {
            let extra = read_file(path)?;
            rendered.push_str("\n\n");
            rendered.push_str(&extra);
        }

        Ok(rendered)
    }
}

fn read_file(path: &Path) -> Result<String, PromptError> {
    std::fs::read_to_string(path).map_err(|source| PromptError::Io { path: path.to_path_buf(), source })
}

/// Render the tool manifest (name, description, schema) as a stable,
/// human-readable block — the registry hands tools back already sorted by
/// name (§4.3), so this never re-sorts.
fn render_tool_manifest(tools: &[ToolSchema]) -> String {
    if tools.is_empty() {
        return "(no tools registered)".to_string();
    }
    let mut out = String::new();
    for tool in tools {
        out.push_str(&format!("- `{}`: {}\n", tool.name, tool.description));
        out.push_str(&format!(
            "  parameters: {}\n",
            serde_json::to_string(&tool.parameters).unwrap_or_default()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> ToolSchema {
        ToolSchema {
            name: name.to_string(),
            description: format!("runs {name}"),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn default_template_includes_tool_manifest() {
        let builder = PromptBuilder::new(None, vec![]);
        let rendered = builder.render(&[tool("kubectl"), tool("bash")], false).unwrap();
        assert!(rendered.contains("`kubectl`"));
        assert!(rendered.contains("`bash`"));
    }

    #[test]
    fn empty_tool_list_renders_placeholder() {
        let builder = PromptBuilder::new(None, vec![]);
        let rendered = builder.render(&[], false).unwrap();
        assert!(rendered.contains("no tools registered"));
    }

    #[test]
    fn shim_mode_adds_fenced_json_notice() {
        let builder = PromptBuilder::new(None, vec![]);
        let rendered = builder.render(&[], true).unwrap();
        assert!(rendered.contains("fenced"));
    }

    #[test]
    fn non_shim_mode_has_no_shim_notice() {
        let builder = PromptBuilder::new(None, vec![]);
        let rendered = builder.render(&[], false).unwrap();
        assert!(!rendered.contains("does not support native tool calling"));
    }

    #[test]
    fn override_template_is_used_instead_of_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.md");
        std::fs::write(&path, "Custom prompt.\nTools:\n{{tools}}\n").unwrap();
        let builder = PromptBuilder::new(Some(path), vec![]);
        let rendered = builder.render(&[tool("kubectl")], false).unwrap();
        assert!(rendered.starts_with("Custom prompt."));
        assert!(rendered.contains("`kubectl`"));
    }

    #[test]
    fn missing_override_path_is_an_error() {
        let builder = PromptBuilder::new(Some(std::path::PathBuf::from("/no/such/prompt.md")), vec![]);
        assert!(builder.render(&[], false).is_err());
    }

    #[test]
    fn extra_paths_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        std::fs::write(&a, "Extra A").unwrap();
        std::fs::write(&b, "Extra B").unwrap();
        let builder = PromptBuilder::new(None, vec![a, b]);
        let rendered = builder.render(&[], false).unwrap();
        let pos_a = rendered.find("Extra A").unwrap();
        let pos_b = rendered.find("Extra B").unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn missing_extra_path_is_an_error() {
        let builder = PromptBuilder::new(None, vec![std::path::PathBuf::from("/no/such/extra.md")]);
        assert!(builder.render(&[], false).is_err());
    }
}
