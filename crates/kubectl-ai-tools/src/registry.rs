// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::tool::{ToolCall, ToolDefinition};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("bad arguments for {tool}: {message}")]
    BadArguments { tool: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum LoadCustomError {
    #[error("explicit tool-config path does not exist: {0}")]
    ExplicitPathMissing(std::path::PathBuf),
    #[error("io error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse custom tool document {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A schema entry for prompt rendering (name/description/parameters only —
/// no behavior), returned by [`ToolRegistry::all`].
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Document shape read by [`ToolRegistry::load_custom`]: a flat list of
/// shell-templated tools (§4.3, "reads a structured document describing
/// additional tools").
#[derive(Debug, Deserialize)]
struct CustomToolsDocument {
    #[serde(default)]
    tools: Vec<CustomToolSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct CustomToolSpec {
    pub name: String,
    pub description: String,
    pub command_template: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub modifies_resource: Option<String>,
}

/// Process-wide collection mapping tool name → [`ToolDefinition`] (§4.3).
/// Write-mostly at startup; lookups are lock-free after registration
/// freezes (§5) — this crate achieves that simply by taking `&mut self` for
/// every mutating operation and `&self` for lookups, so the caller's own
/// synchronization (e.g. an `Arc` handed out only after setup) enforces it.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDefinition>>,
    /// Names registered via `load_custom`, tracked separately from built-ins
    /// for display only — lookup semantics are identical (§9 "Registry
    /// mutability").
    dynamic: std::collections::HashSet<String>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new(), dynamic: Default::default() }
    }

    /// Idempotent upsert by name; later wins.
    pub fn register(&mut self, tool: Arc<dyn ToolDefinition>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ToolDefinition>> {
        self.tools.get(name).cloned()
    }

    /// Stable ordering (sorted by name) to aid prompt/KV-cache stability.
    pub fn all(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn is_dynamic(&self, name: &str) -> bool {
        self.dynamic.contains(name)
    }

    pub fn parse_invocation(&self, name: &str, args: Value) -> Result<ToolCall, RegistryError> {
        let def = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
        if !args.is_object() {
            return Err(RegistryError::BadArguments {
                tool: name.to_string(),
                message: "arguments must be a JSON object".to_string(),
            });
        }
        // Validate against the required set declared in the schema.
        if let Some(required) = def.input_schema().get("required").and_then(Value::as_array) {
            for field in required {
                let Some(field) = field.as_str() else { continue };
                if args.get(field).is_none() {
                    return Err(RegistryError::BadArguments {
                        tool: name.to_string(),
                        message: format!("missing required argument: {field}"),
                    });
                }
            }
        }
        Ok(ToolCall { id: String::new(), name: name.to_string(), args })
    }

    /// Reads additional tools from `path_or_dir`. Failure to resolve an
    /// explicitly-supplied path is fatal; anything else (e.g. a default
    /// search location that simply doesn't exist) is a warning (§4.3).
    pub fn load_custom(
        &mut self,
        path: &Path,
        explicit: bool,
    ) -> Result<usize, LoadCustomError> {
        if !path.exists() {
            if explicit {
                return Err(LoadCustomError::ExplicitPathMissing(path.to_path_buf()));
            }
            warn!(path = %path.display(), "optional tool-config path not found, skipping");
            return Ok(0);
        }
        let text = std::fs::read_to_string(path).map_err(|source| LoadCustomError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: CustomToolsDocument =
            serde_yaml::from_str(&text).map_err(|source| LoadCustomError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let count = doc.tools.len();
        for spec in doc.tools {
            let name = spec.name.clone();
            self.register(Arc::new(crate::builtin::custom::CustomTool::new(spec)));
            self.dynamic.insert(name);
        }
        Ok(count)
    }
}
