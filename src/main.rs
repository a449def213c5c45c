// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Thin reference driver (§6): parses flags, assembles the engine's
//! dependencies, then pumps terminal stdin/stdout against the engine's
//! `inputs`/`outputs` channels. Not a TUI — that rendering surface is out
//! of scope (§1).

mod cli;
mod llm;

use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use cli::Cli;
use kubectl_ai_core::{Engine, EngineInput};
use kubectl_ai_journal::{FileJournal, Journal};
use kubectl_ai_session::{FilesystemSessionStore, Message, Payload, SessionStore, Source};
use kubectl_ai_tools::ToolRegistry;

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("kubectl-ai: {e}");
            1
        }
    };
    std::process::exit(exit_code);
}

/// Builds every collaborator and drives the engine loop (§6.5 exit codes:
/// 0 normal, 1 fatal init/runtime error, 0 on interactive EOF/exit/quit).
fn run(cli: Cli) -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_async(cli))
}

async fn run_async(cli: Cli) -> anyhow::Result<i32> {
    let explicit_config = cli.config.clone();
    let mcp_config_path = cli.mcp_config.clone();
    let initial_query = cli.query.clone();

    let base_options = kubectl_ai_config::load(explicit_config.as_deref())?;
    let options = cli.into_options(base_options).resolve()?;

    let journal: Box<dyn Journal> = Box::new(FileJournal::open(options.trace_path.clone())?);

    let session_store: Arc<dyn SessionStore> =
        Arc::new(FilesystemSessionStore::new(FilesystemSessionStore::default_root()));

    let mut registry: ToolRegistry = kubectl_ai_tools::default_registry();
    for path in &options.tool_config_paths {
        registry.load_custom(path, true)?;
    }

    let remote_tool_status = if options.mcp_client {
        let mcp_path = mcp_config_path.unwrap_or_else(default_mcp_config_path);
        if mcp_path.exists() {
            let servers = kubectl_ai_config::load_mcp_config(&mcp_path)?;
            let (status, definitions) = kubectl_ai_mcp_client::connect_all(&servers).await;
            for def in definitions {
                registry.register(def);
            }
            Some(status)
        } else {
            None
        }
    } else {
        None
    };

    let llm_config = llm::OpenAiCompatConfig::from_env(options.llm_provider.as_deref());
    let llm = llm::client_for(llm_config)?;

    let (engine, handles) =
        Engine::init(llm, registry, session_store, journal, options, remote_tool_status).await?;

    let mut inputs = handles.inputs;
    let mut outputs = handles.outputs;

    let engine_task = tokio::spawn(engine.run(initial_query));

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(message) = outputs.recv().await {
        if !render(&message) {
            continue;
        }
        match &message.payload {
            Payload::UserChoiceRequest { .. } => match read_choice(&mut lines).await? {
                Some(choice) => {
                    if inputs.send(EngineInput::UserChoiceResponse { choice }).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = inputs.send(EngineInput::EndOfInput).await;
                    break;
                }
            },
            Payload::UserInputRequest { .. } => match lines.next_line().await? {
                Some(line) => {
                    if inputs.send(EngineInput::UserInputResponse { query: line }).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = inputs.send(EngineInput::EndOfInput).await;
                    break;
                }
            },
            _ => {}
        }
    }

    engine_task.await??;
    Ok(0)
}

/// Print a `Message` to stdout in a human-readable form. Returns `true` if
/// the message is one the terminal loop must follow up on (a request for
/// the next line of stdin).
fn render(message: &Message) -> bool {
    match &message.payload {
        Payload::Text { text, .. } if message.source != Source::User => {
            println!("{text}");
            false
        }
        Payload::Error { message: text } => {
            eprintln!("error: {text}");
            false
        }
        Payload::ToolCallRequest { tool_name, description, .. } => {
            println!("> running {tool_name}: {description}");
            false
        }
        Payload::ToolCallResponse { tool_name, is_error, result, .. } => {
            let content = result.get("content").and_then(|v| v.as_str()).unwrap_or("");
            if *is_error {
                println!("< {tool_name} failed:\n{content}");
            } else {
                println!("< {tool_name}:\n{content}");
            }
            false
        }
        Payload::UserInputRequest { prompt } => {
            print!("{prompt}\n> ");
            let _ = std::io::stdout().flush();
            true
        }
        Payload::UserChoiceRequest { prompt, options } => {
            println!("{prompt}");
            for (i, opt) in options.iter().enumerate() {
                println!("  {}. {opt}", i + 1);
            }
            print!("> ");
            let _ = std::io::stdout().flush();
            true
        }
        _ => false,
    }
}

async fn read_choice(
    lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
) -> anyhow::Result<Option<u8>> {
    loop {
        match lines.next_line().await? {
            Some(line) => match line.trim().parse::<u8>() {
                Ok(choice) if (1..=3).contains(&choice) => return Ok(Some(choice)),
                _ => {
                    print!("please enter 1, 2, or 3\n> ");
                    let _ = std::io::stdout().flush();
                }
            },
            None => return Ok(None),
        }
    }
}

fn default_mcp_config_path() -> std::path::PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("kubectl-ai")
        .join("mcp.yaml")
}
