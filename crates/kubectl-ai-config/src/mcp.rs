// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `{USER_CONFIG}/kubectl-ai/mcp.yaml` document (§6.4).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct McpDocument {
    #[serde(default)]
    pub servers: Vec<RemoteServerConfig>,
}

/// One entry of the `servers` list. Exactly one of `command` or `url` must
/// be set — enforced by [`load_mcp_config`], not by serde, so the error
/// message can name the offending server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteServerConfig {
    pub name: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub use_streaming: bool,
}

impl RemoteServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
    ApiKey { header: String, key: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum McpConfigError {
    #[error("failed to read mcp config {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse mcp config {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("server {0:?} must specify exactly one of command or url")]
    AmbiguousTransport(String),
}

/// Load `mcp.yaml`, then apply the `MCP_<SERVER>_*` environment overrides
/// documented in §6.4: `MCP_<SERVER_UPPERCASE>_URL|TOKEN|API_KEY|USERNAME|
/// PASSWORD|COMMAND`.
pub fn load_mcp_config(path: &Path) -> Result<Vec<RemoteServerConfig>, McpConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| McpConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut doc: McpDocument =
        serde_yaml::from_str(&text).map_err(|source| McpConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    for server in &mut doc.servers {
        apply_env_overrides(server);
        if server.command.is_some() == server.url.is_some() {
            return Err(McpConfigError::AmbiguousTransport(server.name.clone()));
        }
    }
    Ok(doc.servers)
}

fn env_prefix(name: &str) -> String {
    format!(
        "MCP_{}",
        name.to_uppercase().replace(['-', ' '], "_")
    )
}

fn apply_env_overrides(server: &mut RemoteServerConfig) {
    let prefix = env_prefix(&server.name);

    if let Ok(url) = std::env::var(format!("{prefix}_URL")) {
        server.url = Some(url);
        server.command = None;
    }
    if let Ok(command) = std::env::var(format!("{prefix}_COMMAND")) {
        server.command = Some(command);
        server.url = None;
    }
    if let Ok(token) = std::env::var(format!("{prefix}_TOKEN")) {
        server.auth = Some(AuthConfig::Bearer { token });
    }
    if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
        server.auth = Some(AuthConfig::ApiKey {
            header: "X-API-Key".to_string(),
            key,
        });
    }
    if let (Ok(username), Ok(password)) = (
        std::env::var(format!("{prefix}_USERNAME")),
        std::env::var(format!("{prefix}_PASSWORD")),
    ) {
        server.auth = Some(AuthConfig::Basic { username, password });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("mcp.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_command_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_yaml(
            &dir,
            "servers:\n  - name: local\n    command: my-tool-server\n",
        );
        let servers = load_mcp_config(&path).unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].command.as_deref(), Some("my-tool-server"));
    }

    #[test]
    fn rejects_both_command_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_yaml(
            &dir,
            "servers:\n  - name: bad\n    command: x\n    url: http://x\n",
        );
        assert!(matches!(
            load_mcp_config(&path),
            Err(McpConfigError::AmbiguousTransport(_))
        ));
    }

    #[test]
    fn rejects_neither_command_nor_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_yaml(&dir, "servers:\n  - name: bad\n");
        assert!(matches!(
            load_mcp_config(&path),
            Err(McpConfigError::AmbiguousTransport(_))
        ));
    }

    #[test]
    fn env_override_token_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_yaml(
            &dir,
            "servers:\n  - name: remote\n    url: http://example.test\n",
        );
        std::env::set_var("MCP_REMOTE_TOKEN", "secret-token");
        let servers = load_mcp_config(&path).unwrap();
        std::env::remove_var("MCP_REMOTE_TOKEN");
        match &servers[0].auth {
            Some(AuthConfig::Bearer { token }) => assert_eq!(token, "secret-token"),
            other => panic!("expected bearer auth, got {other:?}"),
        }
    }

    #[test]
    fn default_timeout_is_30s() {
        let cfg = RemoteServerConfig {
            name: "x".into(),
            command: Some("y".into()),
            args: vec![],
            env: Default::default(),
            url: None,
            auth: None,
            oauth: None,
            timeout_secs: None,
            use_streaming: false,
        };
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
    }
}
