// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Agent Conversation Engine (C8): the state machine orchestrating the
//! Model Client Adapter, Tool Registry, Session Store, Journal and Prompt
//! Builder into one agentic loop (§4.8).

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use kubectl_ai_config::ResolvedOptions;
use kubectl_ai_journal::{Journal, JournalEvent};
use kubectl_ai_model::{
    FunctionCall, Message as ModelMessage, ModelClient, Part, ResponseEvent, ResponseStream, RetryConfig,
    ShimChat, ToolSchema as ModelToolSchema,
};
use kubectl_ai_prompt::PromptBuilder;
use kubectl_ai_session::{
    AgentState, InvalidCombination, Message as SessionMessage, Payload, RemoteToolStatus, SessionMetadata,
    SessionStore, Source,
};
use kubectl_ai_tools::{ModifiesResource, ToolCallAnalysis, ToolRegistry, ToolSchema as ToolsToolSchema};

use crate::dispatch;
use crate::error::EngineError;
use crate::input::EngineInput;

/// Handles the UI holds: `inputs` to post answers, `outputs` to consume
/// emitted [`SessionMessage`]s (§4.8 public contract). Dropping `inputs`
/// (or sending [`EngineInput::EndOfInput`]) signals end-of-input; the
/// engine closes `outputs` by returning from `run`.
pub struct EngineHandles {
    pub inputs: mpsc::Sender<EngineInput>,
    pub outputs: mpsc::Receiver<SessionMessage>,
}

/// Chat-crate and tools-crate both expose a `ToolSchema` of identical shape
/// for different purposes; bridge the two explicitly at the one seam that
/// needs it (building the model's function-call manifest).
pub(crate) fn to_model_schemas(schemas: Vec<ToolsToolSchema>) -> Vec<ModelToolSchema> {
    schemas
        .into_iter()
        .map(|t| ModelToolSchema { name: t.name, description: t.description, parameters: t.parameters })
        .collect()
}

/// Orchestrates one agent run end to end (§4.8). Owns the session's `Chat`
/// exclusively; replaced wholesale on a `clear`/`reset` meta-query (§9
/// "Cycles/ownership").
pub struct Engine {
    pub(crate) llm: Arc<dyn ModelClient>,
    pub(crate) chat: Box<dyn kubectl_ai_model::Chat>,
    pub(crate) tools: ToolRegistry,
    pub(crate) session_store: Arc<dyn SessionStore>,
    pub(crate) journal: Box<dyn Journal>,
    pub(crate) options: ResolvedOptions,
    pub(crate) shim_mode: bool,
    pub(crate) model_id: String,
    pub(crate) system_prompt: String,
    pub(crate) work_dir: PathBuf,
    pub(crate) session_id: String,
    pub(crate) state: AgentState,
    pub(crate) iteration: u32,
    pub(crate) current_chat_content: Vec<ModelMessage>,
    pub(crate) pending_batch: Vec<ToolCallAnalysis>,
    pub(crate) cached_models: Option<Vec<String>>,
    pub(crate) inputs: mpsc::Receiver<EngineInput>,
    pub(crate) outputs: mpsc::Sender<SessionMessage>,
}

impl Engine {
    /// Builds the system prompt, creates an ephemeral working directory,
    /// opens a chat, registers function definitions when not in shim mode,
    /// and allocates a fresh session (§4.8 public contract: `init`).
    pub async fn init(
        llm: Arc<dyn ModelClient>,
        tools: ToolRegistry,
        session_store: Arc<dyn SessionStore>,
        journal: Box<dyn Journal>,
        options: ResolvedOptions,
        remote_tool_status: Option<RemoteToolStatus>,
    ) -> Result<(Engine, EngineHandles), EngineError> {
        let shim_mode = options.enable_tool_use_shim;
        let tool_schemas = tools.all();
        let system_prompt = PromptBuilder::new(
            options.prompt_template_file_path.clone(),
            options.extra_prompt_paths.clone(),
        )
        .render(&tool_schemas, shim_mode)?;

        let work_dir = std::env::temp_dir().join(format!("kubectl-ai-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|source| EngineError::WorkDir { path: work_dir.clone(), source })?;

        let model_id = options.model.clone().unwrap_or_else(|| "default".to_string());
        let mut chat = llm
            .start_chat(&system_prompt, &model_id)
            .await
            .map_err(|source| EngineError::StartChat { provider: llm.name().to_string(), source })?;
        if shim_mode {
            chat = Box::new(ShimChat::new(chat));
        } else {
            chat.set_function_definitions(to_model_schemas(tool_schemas));
        }

        let session_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now();
        let metadata = SessionMetadata {
            provider: llm.name().to_string(),
            model: model_id.clone(),
            created_at: now,
            last_accessed: now,
        };
        session_store
            .create_session(&session_id, metadata)
            .await
            .map_err(|source| EngineError::SessionStore { id: session_id.clone(), source })?;

        let (input_tx, input_rx) = mpsc::channel(10);
        let (output_tx, output_rx) = mpsc::channel(10);

        let mut engine = Engine {
            llm,
            chat,
            tools,
            session_store,
            journal,
            options,
            shim_mode,
            model_id,
            system_prompt,
            work_dir,
            session_id,
            state: AgentState::Idle,
            iteration: 0,
            current_chat_content: Vec::new(),
            pending_batch: Vec::new(),
            cached_models: None,
            inputs: input_rx,
            outputs: output_tx,
        };

        if let Some(status) = remote_tool_status {
            let summary = format!(
                "Remote Tool Broker: {}/{} servers connected, {} tools discovered.",
                status.connected(),
                status.total(),
                status.total_tools()
            );
            engine.emit_agent(Payload::Text { text: summary, streaming: false }).await;
        }

        Ok((engine, EngineHandles { inputs: input_tx, outputs: output_rx }))
    }

    /// Runs the loop to completion (§4.8 public contract: `run`). Returns
    /// once the terminal `Exited` state is reached. Fatal only if quiet mode
    /// was configured without an initial query (§6.1 "quiet ... requires
    /// initial query").
    pub async fn run(mut self, initial_query: Option<String>) -> Result<(), EngineError> {
        if self.options.quiet && initial_query.is_none() {
            return Err(EngineError::QuietWithoutInitialQuery);
        }

        let mut pending_initial = initial_query;

        loop {
            match self.state {
                AgentState::Initializing => self.state = AgentState::Idle,
                AgentState::Idle | AgentState::Done => {
                    if let Some(query) = pending_initial.take() {
                        if !self.try_handle_meta_query(&query).await {
                            self.begin_turn(query).await;
                        } else if self.options.quiet {
                            self.state = AgentState::Exited;
                        }
                    } else if self.options.quiet {
                        self.state = AgentState::Exited;
                    } else {
                        self.emit_agent(Payload::UserInputRequest {
                            prompt: "Waiting for your next instruction.".to_string(),
                        })
                        .await;
                        match self.inputs.recv().await {
                            Some(EngineInput::UserInputResponse { query }) => {
                                if !self.try_handle_meta_query(&query).await {
                                    self.begin_turn(query).await;
                                }
                            }
                            Some(EngineInput::UserChoiceResponse { .. }) => {
                                self.emit_agent(Payload::Error {
                                    message: "unexpected choice response while idle".to_string(),
                                })
                                .await;
                            }
                            Some(EngineInput::EndOfInput) | None => self.state = AgentState::Exited,
                        }
                    }
                }
                AgentState::Running => self.run_turn().await,
                AgentState::WaitingForInput => match self.inputs.recv().await {
                    Some(EngineInput::UserChoiceResponse { choice }) => self.handle_choice(choice).await,
                    Some(EngineInput::UserInputResponse { .. }) => {
                        self.emit_agent(Payload::Error {
                            message: "expected a choice response (1/2/3)".to_string(),
                        })
                        .await;
                        self.pending_batch.clear();
                        self.state = AgentState::Running;
                    }
                    Some(EngineInput::EndOfInput) | None => {
                        self.pending_batch.clear();
                        self.state = AgentState::Exited;
                    }
                },
                AgentState::Exited => break,
            }
        }

        self.close().await;
        Ok(())
    }

    async fn begin_turn(&mut self, query: String) {
        self.emit(Source::User, Payload::Text { text: query.clone(), streaming: false }).await;
        self.current_chat_content = vec![ModelMessage::user(query)];
        self.pending_batch.clear();
        self.iteration = 0;
        self.state = AgentState::Running;
    }

    /// One Running-state step (§4.8 "Main state machine" / "Running").
    async fn run_turn(&mut self) {
        if self.iteration >= self.options.max_iterations {
            self.emit_agent(Payload::Text {
                text: "Maximum number of iterations reached.".to_string(),
                streaming: false,
            })
            .await;
            self.state = AgentState::Done;
            return;
        }

        self.journal.write(JournalEvent::new(
            "llm-chat",
            serde_json::json!({ "iteration": self.iteration, "messages": self.current_chat_content.len() }),
        ));

        let outgoing = std::mem::take(&mut self.current_chat_content);
        let stream = match self.send_with_retry(outgoing).await {
            Ok(stream) => stream,
            Err(e) => {
                self.emit_agent(Payload::Error { message: format!("model request failed: {e}") }).await;
                self.state = if self.options.quiet { AgentState::Exited } else { AgentState::Done };
                return;
            }
        };

        let (text, calls, transport_issue, validation_issue) = self.consume_stream(stream).await;

        if let Some(message) = transport_issue {
            self.emit_agent(Payload::Error { message: format!("model stream failed: {message}") }).await;
            self.state = if self.options.quiet { AgentState::Exited } else { AgentState::Done };
            return;
        }

        if !text.is_empty() {
            self.emit_agent(Payload::Text { text, streaming: false }).await;
        }

        if let Some(message) = validation_issue {
            self.current_chat_content
                .push(ModelMessage::user(format!("Your last response could not be parsed:\n{message}")));
            self.iteration += 1;
            self.state = AgentState::Running;
            return;
        }

        if calls.is_empty() {
            self.state = AgentState::Done;
            return;
        }

        let (valid, invalid) = dispatch::analyze_calls(&self.tools, calls);
        for bad in invalid {
            self.current_chat_content
                .push(dispatch::encode_failure(self.shim_mode, &bad.name, &bad.id, &bad.message));
        }

        if valid.is_empty() {
            self.iteration += 1;
            self.state = AgentState::Running;
            return;
        }

        if valid.iter().any(|a| a.is_interactive) {
            self.emit_agent(Payload::Error {
                message: "One or more proposed actions require an interactive terminal and were not run."
                    .to_string(),
            })
            .await;
            for analysis in &valid {
                let reason = dispatch::interactive_batch_reason(analysis);
                self.current_chat_content.push(dispatch::encode_failure(
                    self.shim_mode,
                    &analysis.call.name,
                    &analysis.call.id,
                    &reason,
                ));
            }
            self.iteration += 1;
            self.state = AgentState::Running;
            return;
        }

        let needs_permission =
            valid.iter().any(|a| a.modifies_resource != ModifiesResource::No) && !self.options.skip_permissions;
        if needs_permission {
            let commands: Vec<String> = valid.iter().map(|a| dispatch::describe_call(&a.call)).collect();
            if self.options.quiet {
                self.emit_agent(Payload::Error {
                    message: format!(
                        "Permission required to run: {}. Re-run with --skip-permissions to proceed non-interactively.",
                        commands.join(", ")
                    ),
                })
                .await;
                self.state = AgentState::Exited;
                return;
            }
            self.emit_agent(Payload::UserChoiceRequest {
                prompt: format!("About to run: {}. Proceed?", commands.join(", ")),
                options: vec!["Yes".to_string(), "Yes, and don't ask again".to_string(), "No".to_string()],
            })
            .await;
            self.pending_batch = valid;
            self.state = AgentState::WaitingForInput;
            return;
        }

        self.dispatch_batch(valid).await;
        self.iteration += 1;
        self.state = AgentState::Running;
    }

    /// Drain one streamed response into accumulated text, proposed function
    /// calls, and at most one of {transport failure, validation failure}.
    async fn consume_stream(
        &mut self,
        mut stream: ResponseStream,
    ) -> (String, Vec<FunctionCall>, Option<String>, Option<String>) {
        let mut text = String::new();
        let mut calls = Vec::new();
        let mut transport_issue = None;
        let mut validation_issue = None;

        while let Some(event) = stream.next().await {
            match event {
                Ok(ResponseEvent::Part(Part::Text(t))) => {
                    text.push_str(&t);
                    self.emit_agent(Payload::Text { text: text.clone(), streaming: true }).await;
                }
                Ok(ResponseEvent::Part(Part::FunctionCalls(mut fc))) => calls.append(&mut fc),
                Ok(ResponseEvent::Done) => break,
                Ok(ResponseEvent::Error(e)) => {
                    validation_issue = Some(e);
                    break;
                }
                Err(e) => {
                    transport_issue = Some(e.to_string());
                    break;
                }
            }
        }

        (text, calls, transport_issue, validation_issue)
    }

    /// Resolution of the WaitingForInput permission gate (§4.8).
    async fn handle_choice(&mut self, choice: u8) {
        match choice {
            1 => {
                let batch = std::mem::take(&mut self.pending_batch);
                self.dispatch_batch(batch).await;
                self.iteration += 1;
                self.state = AgentState::Running;
            }
            2 => {
                self.options.skip_permissions = true;
                let batch = std::mem::take(&mut self.pending_batch);
                self.dispatch_batch(batch).await;
                self.iteration += 1;
                self.state = AgentState::Running;
            }
            3 => {
                if let Some(first) = self.pending_batch.first().cloned() {
                    let reason = serde_json::json!({
                        "error": "User declined",
                        "status": "declined",
                        "retryable": false
                    })
                    .to_string();
                    let observation =
                        dispatch::encode_failure(self.shim_mode, &first.call.name, &first.call.id, &reason);
                    self.current_chat_content.push(observation);
                }
                self.pending_batch.clear();
                self.emit_agent(Payload::Error { message: "Operation was skipped by the user.".to_string() })
                    .await;
                self.iteration += 1;
                self.state = AgentState::Running;
            }
            other => {
                self.emit_agent(Payload::Error { message: format!("unrecognized choice: {other}") }).await;
                self.pending_batch.clear();
                self.state = AgentState::Running;
            }
        }
    }

    /// Manual retry loop around `chat.send_streaming` (§4.6 retry policy:
    /// 3 attempts, 10s/60s backoff, factor 2). Written by hand rather than
    /// reusing [`kubectl_ai_model::retry_with_backoff`], whose closure-based
    /// API fights the borrow of `self.chat` across repeated invocations.
    async fn send_with_retry(&mut self, parts: Vec<ModelMessage>) -> anyhow::Result<ResponseStream> {
        let config = RetryConfig::default();
        let mut last_err = None;
        for attempt in 0..config.max_attempts {
            match self.chat.send_streaming(parts.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < config.max_attempts {
                        tokio::time::sleep(config.calculate_delay(attempt)).await;
                    }
                }
            }
        }
        Err(last_err.expect("at least one attempt always runs"))
    }

    /// Append to session history and emit on `outputs`, in that order, so
    /// the two never observe a different sequence (§5 "Ordering
    /// guarantees").
    pub(crate) async fn emit_agent(&mut self, payload: Payload) {
        self.emit(Source::Agent, payload).await
    }

    pub(crate) async fn emit(&mut self, source: Source, payload: Payload) {
        match SessionMessage::new(source, payload) {
            Ok(message) => {
                let _ = self.session_store.append(&self.session_id, message.clone()).await;
                let _ = self.outputs.send(message).await;
            }
            Err(InvalidCombination { source, kind }) => {
                tracing::error!(?source, kind, "dropped message with invalid (source, type) combination");
            }
        }
    }

    /// Releases the working directory iff `RemoveWorkDir` (§4.8 public
    /// contract: `close`).
    async fn close(&mut self) {
        if self.options.remove_workdir {
            let _ = tokio::fs::remove_dir_all(&self.work_dir).await;
        }
        self.journal
            .write(JournalEvent::new("engine-closed", serde_json::json!({ "session_id": self.session_id })));
    }
}
