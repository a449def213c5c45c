// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Pipe and network transports for a single remote tool server connection
//! (§4.5). Each transport exposes one operation — issue a JSON-RPC request,
//! get back the `result` value or a [`TransportError`] — and internally
//! serializes access to the underlying child/stdio or HTTP session (§5,
//! "The Remote Tool Broker serializes access to each child's stdio").

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use kubectl_ai_config::{AuthConfig, OAuthConfig};

use crate::protocol::{JsonRpcRequest, JsonRpcResponse};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to spawn tool server process: {0}")]
    Spawn(String),
    #[error("transport io error: {0}")]
    Io(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("server returned an error: {message} (code {code})")]
    Remote { code: i64, message: String },
    #[error("http error: {0}")]
    Http(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one JSON-RPC call and return its `result` value.
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Best-effort liveness probe used by the verify/ping step (§4.5).
    async fn ping(&self) -> Result<(), TransportError> {
        self.call("ping", Value::Object(Default::default())).await.map(|_| ())
    }
}

/// Spawns a long-lived child process and speaks newline-delimited JSON-RPC
/// over its stdio (§4.5 "Pipe transport").
pub struct PipeTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    next_id: AtomicU64,
}

impl PipeTransport {
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self, TransportError> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        cmd.envs(env);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| TransportError::Spawn(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("child did not expose stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("child did not expose stdout".into()))?;

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
    }
}

#[async_trait]
impl Transport for PipeTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let mut line = serde_json::to_string(&request)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            stdin.flush().await.map_err(|e| TransportError::Io(e.to_string()))?;
        }

        let mut stdout = self.stdout.lock().await;
        loop {
            let mut response_line = String::new();
            let n = stdout
                .read_line(&mut response_line)
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            if n == 0 {
                return Err(TransportError::Io("tool server closed stdout".into()));
            }
            if response_line.trim().is_empty() {
                continue;
            }
            let response: JsonRpcResponse = serde_json::from_str(&response_line)
                .map_err(|e| TransportError::Malformed(e.to_string()))?;
            if response.id != Some(id) {
                // A frame for a different in-flight request under heavy
                // pipelining; not expected given we serialize calls, but
                // skip rather than fail.
                continue;
            }
            if let Some(error) = response.error {
                return Err(TransportError::Remote { code: error.code, message: error.message });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }
}

/// Opens an HTTP (or streaming HTTP) session to a URL with optional auth
/// (§4.5 "Network transport").
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    auth: Option<AuthConfig>,
    oauth: Option<OAuthConfig>,
    next_id: AtomicU64,
    cached_bearer: Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(
        url: String,
        auth: Option<AuthConfig>,
        oauth: Option<OAuthConfig>,
        skip_verify_ssl: bool,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(skip_verify_ssl)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            client,
            url,
            auth,
            oauth,
            next_id: AtomicU64::new(1),
            cached_bearer: Mutex::new(None),
        })
    }

    async fn resolve_bearer_token(&self) -> Result<String, TransportError> {
        if let Some(cached) = self.cached_bearer.lock().await.clone() {
            return Ok(cached);
        }
        let oauth = self
            .oauth
            .as_ref()
            .ok_or_else(|| TransportError::Http("oauth requested but not configured".into()))?;
        let response = self
            .client
            .post(&oauth.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", oauth.client_id.as_str()),
                ("client_secret", oauth.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let body: Value = response.json().await.map_err(|e| TransportError::Http(e.to_string()))?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Http("oauth token response missing access_token".into()))?
            .to_string();
        *self.cached_bearer.lock().await = Some(token.clone());
        Ok(token)
    }

    async fn apply_auth(
        &self,
        mut builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        match &self.auth {
            None | Some(AuthConfig::None) => {
                if self.oauth.is_some() {
                    let token = self.resolve_bearer_token().await?;
                    builder = builder.bearer_auth(token);
                }
            }
            Some(AuthConfig::Basic { username, password }) => {
                builder = builder.basic_auth(username, Some(password));
            }
            Some(AuthConfig::Bearer { token }) => {
                builder = builder.bearer_auth(token);
            }
            Some(AuthConfig::ApiKey { header, key }) => {
                builder = builder.header(header.as_str(), key.as_str());
            }
        }
        Ok(builder)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let builder = self.client.post(&self.url).json(&request);
        let builder = self.apply_auth(builder).await?;

        let response = builder.send().await.map_err(|e| TransportError::Http(e.to_string()))?;
        let response: JsonRpcResponse =
            response.json().await.map_err(|e| TransportError::Malformed(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(TransportError::Remote { code: error.code, message: error.message });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }
}
