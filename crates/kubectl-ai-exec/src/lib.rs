// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Subprocess Runner (C4): executes local shell/kubectl tool calls with
//! working-dir, environment, timeout, and output capture.
//!
//! "A failed command is information, not a transport error" (§4.4) — so
//! [`run`] never returns `Err`; every outcome, including a timeout or a
//! failure to even spawn the child, is folded into [`ExecResult`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

/// Default wall-clock timeout when the caller doesn't specify one (§4.4).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7);

/// Exit classification (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecClassification {
    Ok,
    NonZeroExit(i32),
    Timeout,
    SpawnError(String),
}

/// Combined stdout/stderr text, exit classification, and elapsed time (§3).
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub output: String,
    pub classification: ExecClassification,
    pub elapsed: Duration,
}

impl ExecResult {
    pub fn is_timeout(&self) -> bool {
        matches!(self.classification, ExecClassification::Timeout)
    }
}

/// Input to [`run`] (§4.4).
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub kubeconfig: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub extra_env: Vec<(String, String)>,
}

/// Kubeconfig path expansion failed (§4.4: "failures to expand propagate as
/// ErrorKind::BadConfig"). This is the one operation in this module that can
/// fail outright, since a bad kubeconfig path is a configuration error, not
/// an executed-command result.
#[derive(Debug, thiserror::Error)]
#[error("failed to expand kubeconfig path {path:?}: {reason}")]
pub struct BadConfig {
    pub path: PathBuf,
    pub reason: String,
}

/// Expand a kubeconfig path that may contain `~` or shell variables through
/// a controlled shell invocation (`sh -c 'echo -n -- "<path>"'`), rather than
/// a hand-rolled expansion, so platform-specific shell quoting rules are
/// respected exactly as the user's shell would apply them.
pub async fn expand_kubeconfig_path(path: &std::path::Path) -> Result<PathBuf, BadConfig> {
    let raw = path.to_string_lossy().to_string();
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(format!("echo -n -- \"{raw}\""));
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);

    let output = cmd.output().await.map_err(|e| BadConfig {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(BadConfig {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    let expanded = String::from_utf8_lossy(&output.stdout).into_owned();
    if expanded.is_empty() {
        return Err(BadConfig {
            path: path.to_path_buf(),
            reason: "expansion produced an empty path".into(),
        });
    }
    Ok(PathBuf::from(expanded))
}

/// Run `request.command` through `bash -c`, isolated from any controlling
/// terminal, bounded by `request.timeout` (default [`DEFAULT_TIMEOUT`]).
pub async fn run(request: ExecRequest) -> ExecResult {
    let timeout = request.timeout.unwrap_or(DEFAULT_TIMEOUT);
    let started = Instant::now();

    debug!(command = %request.command, "kubectl-ai-exec: spawning");

    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(&request.command);
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    if let Some(dir) = &request.working_dir {
        cmd.current_dir(dir);
    }
    if let Some(kubeconfig) = &request.kubeconfig {
        cmd.env("KUBECONFIG", kubeconfig);
    }
    for (k, v) in &request.extra_env {
        cmd.env(k, v);
    }
    // Detach from the controlling terminal the same way the built-in shell
    // tool does: stdin is /dev/null and the child gets its own session so it
    // cannot reacquire a tty via /dev/tty.
    #[cfg(unix)]
    unsafe {
        use std::os::unix::process::CommandExt;
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let outcome = tokio::time::timeout(timeout, cmd.output()).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(output)) => {
            let mut combined = String::new();
            combined.push_str(&String::from_utf8_lossy(&output.stdout));
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.is_empty() {
                if !combined.is_empty() {
                    combined.push('\n');
                }
                combined.push_str(&stderr);
            }
            let classification = match output.status.code() {
                Some(0) => ExecClassification::Ok,
                Some(code) => ExecClassification::NonZeroExit(code),
                None => ExecClassification::NonZeroExit(-1),
            };
            ExecResult { output: combined, classification, elapsed }
        }
        Ok(Err(e)) => ExecResult {
            output: String::new(),
            classification: ExecClassification::SpawnError(e.to_string()),
            elapsed,
        },
        Err(_) => ExecResult {
            output: String::new(),
            classification: ExecClassification::Timeout,
            elapsed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_is_ok() {
        let result = run(ExecRequest { command: "echo hi".into(), ..Default::default() }).await;
        assert_eq!(result.classification, ExecClassification::Ok);
        assert!(result.output.contains("hi"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_classified_not_raised() {
        let result = run(ExecRequest { command: "exit 3".into(), ..Default::default() }).await;
        assert_eq!(result.classification, ExecClassification::NonZeroExit(3));
    }

    #[tokio::test]
    async fn timeout_returns_timeout_classification_not_error() {
        let result = run(ExecRequest {
            command: "sleep 5".into(),
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        })
        .await;
        assert!(result.is_timeout());
    }

    #[tokio::test]
    async fn default_timeout_is_seven_seconds() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn working_dir_changes_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(ExecRequest {
            command: "pwd".into(),
            working_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
        .await;
        assert_eq!(result.classification, ExecClassification::Ok);
        assert!(result.output.trim().ends_with(
            dir.path()
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
        ));
    }

    #[tokio::test]
    async fn kubeconfig_env_is_set() {
        let result = run(ExecRequest {
            command: "echo $KUBECONFIG".into(),
            kubeconfig: Some(PathBuf::from("/tmp/kubeconfig-test")),
            ..Default::default()
        })
        .await;
        assert!(result.output.contains("/tmp/kubeconfig-test"));
    }

    #[tokio::test]
    async fn expand_tilde_kubeconfig_path() {
        let expanded = expand_kubeconfig_path(std::path::Path::new("~/.kube/config"))
            .await
            .unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[tokio::test]
    async fn spawn_error_for_nonexistent_interpreter() {
        // bash itself is assumed present; simulate a spawn error path by
        // using a command that cannot start due to an invalid working dir.
        let result = run(ExecRequest {
            command: "echo hi".into(),
            working_dir: Some(PathBuf::from("/no/such/directory/kubectl-ai")),
            ..Default::default()
        })
        .await;
        assert!(matches!(result.classification, ExecClassification::SpawnError(_)));
    }
}
