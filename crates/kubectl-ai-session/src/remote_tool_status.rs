// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

/// One remote tool discovered on a given server (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredTool {
    pub name: String,
    pub description: String,
    pub origin_server: String,
}

/// The stage a server's connection reached, mirroring the broker's
/// connection lifecycle (§4.5 supplement) so a snapshot can report exactly
/// where a failed server got stuck rather than a bare connected/not flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStage {
    Connecting,
    Initializing,
    Stabilizing,
    Verifying,
    Ready,
    /// `at` names the phase the attempt was in when it failed (e.g.
    /// "initializing"); `reason` is the broker's diagnostic message.
    Failed { at: String, reason: String },
}

impl ConnectionStage {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionStage::Ready)
    }
}

impl fmt::Display for ConnectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStage::Connecting => write!(f, "connecting"),
            ConnectionStage::Initializing => write!(f, "initializing"),
            ConnectionStage::Stabilizing => write!(f, "stabilizing"),
            ConnectionStage::Verifying => write!(f, "verifying"),
            ConnectionStage::Ready => write!(f, "ready"),
            ConnectionStage::Failed { at, reason } => write!(f, "failed at {at}: {reason}"),
        }
    }
}

/// Per-server connection snapshot (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteServerSnapshot {
    pub name: String,
    pub command_or_url: String,
    pub stage: ConnectionStage,
    pub tools: Vec<DiscoveredTool>,
}

impl RemoteServerSnapshot {
    pub fn is_connected(&self) -> bool {
        self.stage.is_ready()
    }
}

/// Aggregate Remote Tool Broker status (§3), owned by C5 and snapshotted
/// into [`crate::Session`] by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteToolStatus {
    pub servers: Vec<RemoteServerSnapshot>,
}

impl RemoteToolStatus {
    pub fn total(&self) -> usize {
        self.servers.len()
    }

    pub fn connected(&self) -> usize {
        self.servers.iter().filter(|s| s.is_connected()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.connected()
    }

    pub fn total_tools(&self) -> usize {
        self.servers.iter().map(|s| s.tools.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_counters_match_server_list() {
        let status = RemoteToolStatus {
            servers: vec![
                RemoteServerSnapshot {
                    name: "a".into(),
                    command_or_url: "cmd".into(),
                    stage: ConnectionStage::Ready,
                    tools: vec![DiscoveredTool {
                        name: "t1".into(),
                        description: "".into(),
                        origin_server: "a".into(),
                    }],
                },
                RemoteServerSnapshot {
                    name: "b".into(),
                    command_or_url: "http://x".into(),
                    stage: ConnectionStage::Failed {
                        at: "initializing".into(),
                        reason: "connection refused".into(),
                    },
                    tools: vec![],
                },
            ],
        };
        assert_eq!(status.total(), 2);
        assert_eq!(status.connected(), 1);
        assert_eq!(status.failed(), 1);
        assert_eq!(status.total_tools(), 1);
    }

    #[test]
    fn failed_stage_reports_phase_and_reason() {
        let stage = ConnectionStage::Failed { at: "verifying".into(), reason: "timed out".into() };
        assert!(!stage.is_ready());
        assert_eq!(stage.to_string(), "failed at verifying: timed out");
    }
}
