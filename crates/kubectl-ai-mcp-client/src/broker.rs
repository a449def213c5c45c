// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Remote Tool Broker (C5): connects to every configured remote tool
//! server, discovers its tools, and hands back both a [`RemoteToolStatus`]
//! snapshot (for the session) and the live [`RemoteTool`] definitions (for
//! the registry) — §4.5.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use kubectl_ai_config::RemoteServerConfig;
use kubectl_ai_model::{retry_with_backoff, RetryConfig};
use kubectl_ai_session::{ConnectionStage, DiscoveredTool, RemoteServerSnapshot, RemoteToolStatus};
use kubectl_ai_tools::ToolDefinition;

use crate::lifecycle::{ConnectionState, FailedAt};
use crate::protocol::{initialize_params, ClientInfo, ToolsListResult};
use crate::remote_tool::RemoteTool;
use crate::transport::{HttpTransport, PipeTransport, Transport, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const STABILIZATION_DELAY: Duration = Duration::from_secs(2);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);
const PING_BEFORE_RETRY: Duration = Duration::from_secs(5);

/// Outcome of connecting to one server: its final lifecycle state plus, if
/// it reached [`ConnectionState::Ready`], the transport and discovered
/// tools that came with it.
struct ServerConnection {
    name: String,
    command_or_url: String,
    state: ConnectionState,
    transport: Option<Arc<dyn Transport>>,
    tools: Vec<crate::protocol::RemoteToolDescriptor>,
}

impl From<ConnectionState> for ConnectionStage {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connecting => ConnectionStage::Connecting,
            ConnectionState::Initializing => ConnectionStage::Initializing,
            ConnectionState::Stabilizing => ConnectionStage::Stabilizing,
            ConnectionState::Verifying => ConnectionStage::Verifying,
            ConnectionState::Ready => ConnectionStage::Ready,
            ConnectionState::Failed { at, reason } => {
                ConnectionStage::Failed { at: at.to_string(), reason }
            }
        }
    }
}

fn discovery_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(10),
        backoff_multiplier: 2.0,
        jitter_factor: 0.1,
    }
}

fn build_transport(config: &RemoteServerConfig) -> Result<Arc<dyn Transport>, TransportError> {
    if let Some(command) = &config.command {
        let transport = PipeTransport::spawn(command, &config.args, &config.env)?;
        Ok(Arc::new(transport))
    } else {
        let url = config.url.clone().expect("exactly one of command/url is set (§6.4)");
        let transport = HttpTransport::new(url, config.auth.clone(), config.oauth.clone(), false)?;
        Ok(Arc::new(transport))
    }
}

async fn connect_one(config: &RemoteServerConfig) -> ServerConnection {
    let command_or_url = config.command.clone().unwrap_or_else(|| config.url.clone().unwrap_or_default());
    info!(server = %config.name, "connecting to remote tool server");

    let transport = match timeout(CONNECT_TIMEOUT, async { build_transport(config) }).await {
        Ok(Ok(t)) => t,
        Ok(Err(e)) => {
            return ServerConnection {
                name: config.name.clone(),
                command_or_url,
                state: ConnectionState::Failed { at: FailedAt::Connecting, reason: e.to_string() },
                transport: None,
                tools: vec![],
            };
        }
        Err(_) => {
            return ServerConnection {
                name: config.name.clone(),
                command_or_url,
                state: ConnectionState::Failed {
                    at: FailedAt::Connecting,
                    reason: "connect timed out".to_string(),
                },
                transport: None,
                tools: vec![],
            };
        }
    };

    let client = ClientInfo::default();
    match timeout(CONNECT_TIMEOUT, transport.call("initialize", initialize_params(&client))).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            return ServerConnection {
                name: config.name.clone(),
                command_or_url,
                state: ConnectionState::Failed { at: FailedAt::Initializing, reason: e.to_string() },
                transport: None,
                tools: vec![],
            };
        }
        Err(e) => {
            return ServerConnection {
                name: config.name.clone(),
                command_or_url,
                state: ConnectionState::Failed {
                    at: FailedAt::Initializing,
                    reason: format!("initialize timed out: {e}"),
                },
                transport: None,
                tools: vec![],
            };
        }
    }

    sleep(STABILIZATION_DELAY).await;

    let tools = match list_tools_with_retry(&transport).await {
        Ok(tools) => tools,
        Err(e) => {
            return ServerConnection {
                name: config.name.clone(),
                command_or_url,
                state: ConnectionState::Failed { at: FailedAt::Verifying, reason: e.to_string() },
                transport: None,
                tools: vec![],
            };
        }
    };

    ServerConnection {
        name: config.name.clone(),
        command_or_url,
        state: ConnectionState::Ready,
        transport: Some(transport),
        tools,
    }
}

/// Verify liveness by listing tools within [`VERIFY_TIMEOUT`]; on failure,
/// ping once and retry the listing before giving up (§4.5 supplement).
async fn list_tools_with_retry(
    transport: &Arc<dyn Transport>,
) -> Result<Vec<crate::protocol::RemoteToolDescriptor>, TransportError> {
    match timeout(VERIFY_TIMEOUT, transport.call("tools/list", serde_json::json!({}))).await {
        Ok(Ok(value)) => return parse_tools_list(value),
        Ok(Err(_)) | Err(_) => {}
    }

    timeout(PING_BEFORE_RETRY, transport.ping())
        .await
        .map_err(|_| TransportError::Io("ping before retry timed out".into()))??;

    let value = timeout(VERIFY_TIMEOUT, transport.call("tools/list", serde_json::json!({})))
        .await
        .map_err(|_| TransportError::Io("tools/list retry timed out".into()))??;
    parse_tools_list(value)
}

fn parse_tools_list(
    value: serde_json::Value,
) -> Result<Vec<crate::protocol::RemoteToolDescriptor>, TransportError> {
    let result: ToolsListResult =
        serde_json::from_value(value).map_err(|e| TransportError::Malformed(e.to_string()))?;
    Ok(result.tools)
}

/// Connect to every configured server (with the discovery retry policy
/// applied per server) and return the combined status snapshot plus the
/// live tool definitions ready for registration.
pub async fn connect_all(
    servers: &[RemoteServerConfig],
) -> (RemoteToolStatus, Vec<Arc<dyn ToolDefinition>>) {
    let mut snapshots = Vec::with_capacity(servers.len());
    let mut definitions: Vec<Arc<dyn ToolDefinition>> = Vec::new();

    for config in servers {
        let retry_config = discovery_retry_config();
        let connection = retry_with_backoff(
            retry_config,
            || async { connect_once_as_result(config).await },
            || false,
        )
        .await
        .unwrap_or_else(|conn| conn);

        if connection.state.is_ready() {
            let transport = connection.transport.clone().expect("ready implies transport");
            for descriptor in &connection.tools {
                definitions.push(Arc::new(RemoteTool::new(
                    &connection.name,
                    descriptor.clone(),
                    transport.clone(),
                    config.timeout(),
                )));
            }
        } else {
            warn!(
                server = %connection.name,
                reason = connection.state.failure_reason().unwrap_or("unknown"),
                "remote tool server unreachable"
            );
        }

        snapshots.push(RemoteServerSnapshot {
            name: connection.name.clone(),
            command_or_url: connection.command_or_url.clone(),
            stage: connection.state.clone().into(),
            tools: connection
                .tools
                .iter()
                .map(|t| DiscoveredTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    origin_server: connection.name.clone(),
                })
                .collect(),
        });
    }

    (RemoteToolStatus { servers: snapshots }, definitions)
}

/// Wraps [`connect_one`] so the discovery retry loop can treat "reached
/// `Failed`" as the retryable error case, while a `Ready` result is `Ok`.
async fn connect_once_as_result(config: &RemoteServerConfig) -> Result<ServerConnection, ServerConnection> {
    let connection = connect_one(config).await;
    if connection.state.is_ready() {
        Ok(connection)
    } else {
        Err(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_all_marks_unreachable_command_as_failed() {
        let servers = vec![RemoteServerConfig {
            name: "broken".into(),
            command: Some("/no/such/binary-kubectl-ai-broker-test".into()),
            args: vec![],
            env: Default::default(),
            url: None,
            auth: None,
            oauth: None,
            timeout_secs: None,
            use_streaming: false,
        }];
        let (status, definitions) = connect_all(&servers).await;
        assert_eq!(status.total(), 1);
        assert_eq!(status.connected(), 0);
        assert!(definitions.is_empty());
    }

    #[tokio::test]
    async fn connect_all_discovers_tools_from_a_scripted_server() {
        let script = concat!(
            r#"read a; echo '{"jsonrpc":"2.0","id":1,"result":{}}'; "#,
            r#"read b; echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"list_pods","description":"lists pods","inputSchema":{"type":"object"}}]}}'"#
        );
        let servers = vec![RemoteServerConfig {
            name: "cluster-a".into(),
            command: Some("sh".into()),
            args: vec!["-c".to_string(), script.to_string()],
            env: Default::default(),
            url: None,
            auth: None,
            oauth: None,
            timeout_secs: None,
            use_streaming: false,
        }];
        let (status, definitions) = connect_all(&servers).await;
        assert_eq!(status.connected(), 1);
        assert_eq!(status.total_tools(), 1);
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name(), "cluster-a.list_pods");
    }
}
