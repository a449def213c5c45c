// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// `user-interface` option (§6.1). Rendering itself is out of scope; this
/// crate only records which one the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserInterface {
    Terminal,
    Html,
    Tui,
}

impl Default for UserInterface {
    fn default() -> Self {
        UserInterface::Terminal
    }
}

/// The full set of recognized configuration-document fields (§6.1).
///
/// Every field is optional in the document itself; this struct carries the
/// raw, still-unresolved values as read from YAML. Call [`Options::resolve`]
/// to apply defaults and precedence rules (kubeconfig, trace-path,
/// max-iterations) and fail on stale/unreadable explicit paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Options {
    pub llm_provider: Option<String>,
    pub model: Option<String>,
    pub skip_permissions: Option<bool>,
    pub enable_tool_use_shim: Option<bool>,
    pub quiet: Option<bool>,
    pub max_iterations: Option<u32>,
    pub kubeconfig: Option<PathBuf>,
    pub prompt_template_file_path: Option<PathBuf>,
    pub extra_prompt_paths: Option<Vec<PathBuf>>,
    pub trace_path: Option<PathBuf>,
    pub remove_workdir: Option<bool>,
    pub tool_config_paths: Option<Vec<PathBuf>>,
    pub user_interface: Option<UserInterface>,
    pub ui_listen_address: Option<String>,
    pub skip_verify_ssl: Option<bool>,
    pub mcp_server: Option<bool>,
    pub mcp_client: Option<bool>,
    pub external_tools: Option<bool>,
}

/// Default iteration cap, per §6.1.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

impl Options {
    /// Apply the documented defaults and precedence rules, producing a value
    /// ready to drive the engine. Does not touch the filesystem except to
    /// canonicalize `kubeconfig` and to verify `tool_config_paths` entries
    /// that were explicitly set (missing explicit paths are fatal; §4.3).
    pub fn resolve(mut self) -> Result<ResolvedOptions, ConfigError> {
        if let Some(true) = self.external_tools {
            if self.mcp_server != Some(true) {
                return Err(ConfigError::InvalidField {
                    field: "external-tools",
                    message: "external-tools is only valid together with mcp-server".into(),
                });
            }
        }
        if self.quiet == Some(true) {
            // quiet requires an initial query; enforced by the caller that
            // supplies the query, not by this crate — recorded here only as
            // a documentation anchor for the invariant.
        }

        let kubeconfig = resolve_kubeconfig(self.kubeconfig.take())?;
        let trace_path = self
            .trace_path
            .take()
            .unwrap_or_else(default_trace_path);
        let max_iterations = self.max_iterations.take().unwrap_or(DEFAULT_MAX_ITERATIONS);

        for explicit in self.tool_config_paths.iter().flatten() {
            let expanded = expand_path(explicit);
            if !expanded.exists() {
                return Err(ConfigError::MissingToolConfigPath(expanded));
            }
        }

        Ok(ResolvedOptions {
            llm_provider: self.llm_provider,
            model: self.model,
            skip_permissions: self.skip_permissions.unwrap_or(false),
            enable_tool_use_shim: self.enable_tool_use_shim.unwrap_or(false),
            quiet: self.quiet.unwrap_or(false),
            max_iterations,
            kubeconfig,
            prompt_template_file_path: self.prompt_template_file_path,
            extra_prompt_paths: self.extra_prompt_paths.unwrap_or_default(),
            trace_path,
            remove_workdir: self.remove_workdir.unwrap_or(true),
            tool_config_paths: self
                .tool_config_paths
                .unwrap_or_default()
                .iter()
                .map(|p| expand_path(p))
                .collect(),
            user_interface: self.user_interface.unwrap_or_default(),
            ui_listen_address: self.ui_listen_address,
            skip_verify_ssl: self.skip_verify_ssl.unwrap_or(false),
            mcp_server: self.mcp_server.unwrap_or(false),
            mcp_client: self.mcp_client.unwrap_or(false),
            external_tools: self.external_tools.unwrap_or(false),
        })
    }
}

/// Fully-resolved options: every field has its final value, defaults applied,
/// precedence rules settled. This is what `kubectl-ai-core` consumes.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub llm_provider: Option<String>,
    pub model: Option<String>,
    pub skip_permissions: bool,
    pub enable_tool_use_shim: bool,
    pub quiet: bool,
    pub max_iterations: u32,
    pub kubeconfig: PathBuf,
    pub prompt_template_file_path: Option<PathBuf>,
    pub extra_prompt_paths: Vec<PathBuf>,
    pub trace_path: PathBuf,
    pub remove_workdir: bool,
    pub tool_config_paths: Vec<PathBuf>,
    pub user_interface: UserInterface,
    pub ui_listen_address: Option<String>,
    pub skip_verify_ssl: bool,
    pub mcp_server: bool,
    pub mcp_client: bool,
    pub external_tools: bool,
}

/// flag > `KUBECONFIG` env > `$HOME/.kube/config`; canonicalized to an
/// absolute path (§6.1). A flag value is represented here as `explicit`.
fn resolve_kubeconfig(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    let raw = explicit
        .or_else(|| std::env::var_os("KUBECONFIG").map(PathBuf::from))
        .or_else(|| dirs::home_dir().map(|h| h.join(".kube/config")));

    let raw = raw.ok_or_else(|| ConfigError::InvalidField {
        field: "kubeconfig",
        message: "could not determine a kubeconfig path (no flag, $KUBECONFIG, or $HOME)".into(),
    })?;

    let expanded = expand_path(&raw);
    // Canonicalize when possible; a not-yet-existing kubeconfig is not fatal
    // here (the subprocess runner will surface the failure when it is used).
    Ok(expanded.canonicalize().unwrap_or(expanded))
}

fn expand_path(p: &std::path::Path) -> PathBuf {
    let s = p.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&s).into_owned())
}

fn default_trace_path() -> PathBuf {
    std::env::temp_dir().join("kubectl-ai-trace.log")
}
