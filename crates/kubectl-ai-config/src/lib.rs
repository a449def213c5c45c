// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod error;
mod loader;
mod mcp;
mod schema;

pub use error::ConfigError;
pub use loader::{config_search_paths, load};
pub use mcp::{load_mcp_config, AuthConfig, McpConfigError, OAuthConfig, RemoteServerConfig};
pub use schema::{Options, ResolvedOptions, UserInterface, DEFAULT_MAX_ITERATIONS};
