// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Agent Conversation Engine (C8): the single state machine that ties the
//! Journal, Session Store, Tool Registry, Model Client Adapter and Prompt
//! Builder into one agentic loop, plus the meta-query and tool-dispatch
//! logic it needs along the way (§4.8).

mod dispatch;
mod engine;
mod error;
mod input;
mod meta;

pub use engine::{Engine, EngineHandles};
pub use error::EngineError;
pub use input::EngineInput;
