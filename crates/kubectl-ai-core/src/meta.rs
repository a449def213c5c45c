// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Meta-queries recognized before the model loop is ever entered (§4.8
//! "Meta-queries (short-circuit, never touch the LLM)").

use kubectl_ai_session::{AgentState, Payload};

use crate::engine::{to_model_schemas, Engine};

impl Engine {
    /// Returns `true` if `text` was a recognized meta-query and has already
    /// been fully handled; `false` means the caller should treat it as a
    /// real task query bound for the model.
    pub(crate) async fn try_handle_meta_query(&mut self, text: &str) -> bool {
        match text.trim().to_ascii_lowercase().as_str() {
            "clear" | "reset" => {
                self.reset_session().await;
                true
            }
            "exit" | "quit" => {
                self.state = AgentState::Exited;
                true
            }
            "model" => {
                let text = format!("model: {}", self.model_id);
                self.emit_agent(Payload::Text { text, streaming: false }).await;
                true
            }
            "models" => {
                let models = self.cached_model_list().await;
                self.emit_agent(Payload::Text {
                    text: format!("models: {}", models.join(", ")),
                    streaming: false,
                })
                .await;
                true
            }
            "tools" => {
                let names: Vec<String> = self.tools.all().into_iter().map(|t| t.name).collect();
                self.emit_agent(Payload::Text {
                    text: format!("tools: {}", names.join(", ")),
                    streaming: false,
                })
                .await;
                true
            }
            "session" | "sessions" => {
                let text = match self.session_store.list_sessions().await {
                    Ok(sessions) if sessions.is_empty() => "no persisted sessions".to_string(),
                    Ok(sessions) => sessions.iter().map(|s| s.id.clone()).collect::<Vec<_>>().join(", "),
                    Err(e) => format!("failed to list sessions: {e}"),
                };
                self.emit_agent(Payload::Text { text, streaming: false }).await;
                true
            }
            _ => false,
        }
    }

    async fn cached_model_list(&mut self) -> Vec<String> {
        if let Some(models) = &self.cached_models {
            return models.clone();
        }
        let models = self.llm.list_models().await.unwrap_or_default();
        self.cached_models = Some(models.clone());
        models
    }

    /// `clear|reset`: truncate session history and re-initialize chat
    /// (§4.8).
    async fn reset_session(&mut self) {
        if let Err(e) = self.session_store.replace(&self.session_id, Vec::new()).await {
            self.emit_agent(Payload::Error { message: format!("failed to clear session history: {e}") })
                .await;
            return;
        }
        self.current_chat_content.clear();
        self.pending_batch.clear();
        self.iteration = 0;

        match self.llm.start_chat(&self.system_prompt, &self.model_id).await {
            Ok(mut chat) => {
                if self.shim_mode {
                    chat = Box::new(kubectl_ai_model::ShimChat::new(chat));
                } else {
                    chat.set_function_definitions(to_model_schemas(self.tools.all()));
                }
                self.chat = chat;
                self.state = AgentState::Idle;
            }
            Err(e) => {
                self.emit_agent(Payload::Error { message: format!("failed to reopen chat: {e}") }).await;
                self.state = AgentState::Exited;
            }
        }
    }
}
