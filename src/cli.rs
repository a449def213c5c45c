// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Flag parsing (§6.1). Every flag mirrors a field of
//! [`kubectl_ai_config::Options`] one-to-one; [`Cli::into_options`] does the
//! mapping. Flags override whatever a config document set.

use std::path::PathBuf;

use clap::Parser;

use kubectl_ai_config::{Options, UserInterface};

#[derive(Parser, Debug)]
#[command(name = "kubectl-ai", about = "Natural-language agent for operating Kubernetes clusters")]
pub struct Cli {
    /// Natural-language request. Omit to start an interactive REPL.
    pub query: Option<String>,

    /// Path to an explicit config document, merged over the search-path
    /// defaults (§6, "Configuration document").
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the `mcp.yaml` remote-tool-server document (§6.4). Defaults
    /// to `{USER_CONFIG}/kubectl-ai/mcp.yaml`.
    #[arg(long)]
    pub mcp_config: Option<PathBuf>,

    #[arg(long)]
    pub llm_provider: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub skip_permissions: bool,

    #[arg(long)]
    pub enable_tool_use_shim: bool,

    /// Run a single turn and exit; requires `query`.
    #[arg(long)]
    pub quiet: bool,

    #[arg(long)]
    pub max_iterations: Option<u32>,

    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    #[arg(long)]
    pub prompt_template_file_path: Option<PathBuf>,

    #[arg(long)]
    pub extra_prompt_paths: Vec<PathBuf>,

    #[arg(long)]
    pub trace_path: Option<PathBuf>,

    #[arg(long)]
    pub remove_workdir: bool,

    #[arg(long)]
    pub tool_config_paths: Vec<PathBuf>,

    #[arg(long, value_enum)]
    pub user_interface: Option<CliUserInterface>,

    #[arg(long)]
    pub ui_listen_address: Option<String>,

    #[arg(long)]
    pub skip_verify_ssl: bool,

    /// Run as a remote tool provider — out of scope for this driver.
    #[arg(long)]
    pub mcp_server: bool,

    /// Activate the Remote Tool Broker (§4.5).
    #[arg(long)]
    pub mcp_client: bool,

    #[arg(long)]
    pub external_tools: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliUserInterface {
    Terminal,
    Html,
    Tui,
}

impl From<CliUserInterface> for UserInterface {
    fn from(v: CliUserInterface) -> Self {
        match v {
            CliUserInterface::Terminal => UserInterface::Terminal,
            CliUserInterface::Html => UserInterface::Html,
            CliUserInterface::Tui => UserInterface::Tui,
        }
    }
}

impl Cli {
    /// Overlay the parsed flags onto a config-document-derived `Options`,
    /// flag wins wherever it was actually set (bools: any `true` flag wins;
    /// §6.1 "flag > ... env > ...").
    pub fn into_options(self, mut base: Options) -> Options {
        if self.llm_provider.is_some() {
            base.llm_provider = self.llm_provider;
        }
        if self.model.is_some() {
            base.model = self.model;
        }
        if self.skip_permissions {
            base.skip_permissions = Some(true);
        }
        if self.enable_tool_use_shim {
            base.enable_tool_use_shim = Some(true);
        }
        if self.quiet {
            base.quiet = Some(true);
        }
        if self.max_iterations.is_some() {
            base.max_iterations = self.max_iterations;
        }
        if self.kubeconfig.is_some() {
            base.kubeconfig = self.kubeconfig;
        }
        if self.prompt_template_file_path.is_some() {
            base.prompt_template_file_path = self.prompt_template_file_path;
        }
        if !self.extra_prompt_paths.is_empty() {
            base.extra_prompt_paths = Some(self.extra_prompt_paths);
        }
        if self.trace_path.is_some() {
            base.trace_path = self.trace_path;
        }
        if self.remove_workdir {
            base.remove_workdir = Some(true);
        }
        if !self.tool_config_paths.is_empty() {
            base.tool_config_paths = Some(self.tool_config_paths);
        }
        if let Some(ui) = self.user_interface {
            base.user_interface = Some(ui.into());
        }
        if self.ui_listen_address.is_some() {
            base.ui_listen_address = self.ui_listen_address;
        }
        if self.skip_verify_ssl {
            base.skip_verify_ssl = Some(true);
        }
        if self.mcp_server {
            base.mcp_server = Some(true);
        }
        if self.mcp_client {
            base.mcp_client = Some(true);
        }
        if self.external_tools {
            base.external_tools = Some(true);
        }
        base
    }
}
