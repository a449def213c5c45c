use serde::{Deserialize, Serialize};

/// Tagged state of the conversation engine (§3). Transitions are defined by
/// the engine (C8); this crate only carries the value as part of [`crate::Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Initializing,
    Idle,
    Running,
    WaitingForInput,
    Done,
    Exited,
}

impl Default for AgentState {
    fn default() -> Self {
        AgentState::Initializing
    }
}
