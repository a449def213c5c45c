// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Fatal failures raised by [`crate::Engine::init`] and by the very start of
//! [`crate::Engine::run`] (§4.8 public contract). Everything past that point
//! is recoverable — runtime failures are surfaced as `error`
//! [`Message`](kubectl_ai_session::Message)s instead (§7).

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to render system prompt: {0}")]
    Prompt(#[from] kubectl_ai_prompt::PromptError),

    #[error("failed to create working directory {path}: {source}")]
    WorkDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open chat with model client {provider}: {source}")]
    StartChat { provider: String, source: anyhow::Error },

    #[error("failed to create session {id}: {source}")]
    SessionStore {
        id: String,
        #[source]
        source: kubectl_ai_session::StoreError,
    },

    #[error("quiet mode requires an initial query")]
    QuietWithoutInitialQuery,
}
