// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent_state::AgentState;
use crate::message::Message;
use crate::remote_tool_status::RemoteToolStatus;

/// Metadata persisted alongside a session's history (§6.2): provider, model,
/// created-at, last-accessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// A conversation identified by an opaque ID (§3). Owned by the engine;
/// created once at agent init, destroyed by process exit.
///
/// Invariant: `messages` is append-only — the sequence observed by the UI
/// is always a consistent prefix of the stored sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub state: AgentState,
    pub remote_tool_status: Option<RemoteToolStatus>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_modified: now,
            messages: Vec::new(),
            state: AgentState::default(),
            remote_tool_status: None,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.last_modified = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Payload, Source};

    #[test]
    fn new_session_starts_initializing_with_no_messages() {
        let s = Session::new("abc");
        assert_eq!(s.state, AgentState::Initializing);
        assert!(s.messages.is_empty());
    }

    #[test]
    fn push_appends_and_bumps_last_modified() {
        let mut s = Session::new("abc");
        let created = s.last_modified;
        std::thread::sleep(std::time::Duration::from_millis(2));
        s.push(Message::new(Source::User, Payload::Text { text: "hi".into(), streaming: false }).unwrap());
        assert_eq!(s.messages.len(), 1);
        assert!(s.last_modified >= created);
    }
}
