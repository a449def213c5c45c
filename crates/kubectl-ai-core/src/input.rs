// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! What the UI may post onto the engine's `inputs` queue (§4.8, §4.9): a
//! concrete answer to a pending `user-input-request`/`user-choice-request`,
//! or a sentinel meaning end-of-input (EOF / Ctrl-D on a terminal).

/// One item posted by the UI onto `Engine::inputs` (§4.8 public contract).
#[derive(Debug, Clone)]
pub enum EngineInput {
    /// Answer to a `UserInputRequest` — either a fresh task query while
    /// Idle/Done, or free text the engine doesn't otherwise expect.
    UserInputResponse { query: String },
    /// Answer to a `UserChoiceRequest` — `1` (yes), `2` (yes, don't ask
    /// again), or `3` (no) for the permission gate (§4.8 WaitingForInput).
    UserChoiceResponse { choice: u8 },
    /// End of input: terminal EOF, Ctrl-D, or the UI closing its sender.
    EndOfInput,
}
