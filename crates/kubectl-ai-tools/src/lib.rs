// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Tool Registry (C3): catalogue of callable tools, invocation parsing, and
//! the safety classification the engine's permission gate consults (§4.3).

pub mod builtin;
pub mod registry;
pub mod tool;
mod truncate;

pub use builtin::bash::BashTool;
pub use builtin::custom::CustomTool;
pub use builtin::kubectl::KubectlTool;
pub use registry::{LoadCustomError, RegistryError, ToolRegistry, ToolSchema};
pub use tool::{
    analyze, explicit_modifies_resource, ExecContext, ModifiesResource, ToolCall, ToolCallAnalysis,
    ToolDefinition, ToolOutput,
};

/// Convenience constructor registering both built-ins (§4.3: "built-in
/// `kubectl` runner ... and a generic `bash` runner").
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(std::sync::Arc::new(KubectlTool));
    registry.register(std::sync::Arc::new(BashTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_both_builtins() {
        let registry = default_registry();
        assert!(registry.lookup("kubectl").is_some());
        assert!(registry.lookup("bash").is_some());
        assert_eq!(registry.all().len(), 2);
    }
}
